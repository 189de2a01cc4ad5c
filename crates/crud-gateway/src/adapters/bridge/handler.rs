use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    core::{
        types::{DeleteRequest, InsertRequest, SelectRequest, UpdateRequest},
        Gateway,
    },
    error::{AppError, AppResult},
};

use super::protocol::*;

pub struct BridgeHandler {
    gateway: Gateway,
}

impl BridgeHandler {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, req: BridgeRequest) -> BridgeResponse<Value> {
        if req.v != PROTOCOL_VERSION {
            let e = AppError::validation(format!("unsupported protocol version: {}", req.v));
            return BridgeResponse::err(req.v, req.id, &e);
        }

        let res = match req.cmd.as_str() {
            "select" => self.handle_select(&req).await,
            "get" => self.handle_get(&req).await,
            "insert" => self.handle_insert(&req).await,
            "update" => self.handle_update(&req).await,
            "delete" => self.handle_delete(&req).await,
            "tables" => self.handle_tables().await,
            "columns" => self.handle_columns(&req).await,
            other => Err(AppError::validation(format!("unknown cmd: {other}"))),
        };

        match res {
            Ok(data) => BridgeResponse::ok(req.v, req.id, data),
            Err(e) => BridgeResponse::err(req.v, req.id, &e),
        }
    }

    async fn handle_select(&self, req: &BridgeRequest) -> AppResult<Value> {
        let mut p: SelectRequest = payload(req)?;
        override_table(&mut p.table_name, req);
        let page = self.gateway.select(p).await?;
        Ok(serde_json::to_value(SelectData::from(page))?)
    }

    async fn handle_get(&self, req: &BridgeRequest) -> AppResult<Value> {
        let p: GetPayload = payload(req)?;
        let table = req.table.as_deref().unwrap_or_default();
        let select = SelectRequest::from_query_params(table, &p.query)?;
        let page = self.gateway.select(select).await?;
        Ok(serde_json::to_value(SelectData::from(page))?)
    }

    async fn handle_insert(&self, req: &BridgeRequest) -> AppResult<Value> {
        let mut p: InsertRequest = payload(req)?;
        override_table(&mut p.table_name, req);
        let ids = self.gateway.insert(p).await?;
        Ok(serde_json::to_value(Datas { datas: ids })?)
    }

    async fn handle_update(&self, req: &BridgeRequest) -> AppResult<Value> {
        let mut p: UpdateRequest = payload(req)?;
        override_table(&mut p.table_name, req);
        let affected = self.gateway.update(p).await?;
        Ok(serde_json::to_value(Datas { datas: affected })?)
    }

    async fn handle_delete(&self, req: &BridgeRequest) -> AppResult<Value> {
        let mut p: DeleteRequest = payload(req)?;
        override_table(&mut p.table_name, req);
        let affected = self.gateway.delete(p).await?;
        Ok(serde_json::to_value(Datas { datas: affected })?)
    }

    async fn handle_tables(&self) -> AppResult<Value> {
        let tables = self.gateway.tables().await?;
        Ok(serde_json::to_value(Datas { datas: tables })?)
    }

    async fn handle_columns(&self, req: &BridgeRequest) -> AppResult<Value> {
        let table = req
            .table
            .clone()
            .ok_or_else(|| AppError::validation("columns requires a table"))?;
        let cols = self.gateway.columns(table).await?;
        Ok(serde_json::to_value(Datas { datas: cols })?)
    }
}

fn payload<T: DeserializeOwned>(req: &BridgeRequest) -> AppResult<T> {
    let raw = match &req.payload {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(raw).map_err(|e| AppError::validation(format!("invalid payload: {e}")))
}

fn override_table(table_name: &mut String, req: &BridgeRequest) {
    if let Some(t) = &req.table {
        *table_name = t.clone();
    }
}
