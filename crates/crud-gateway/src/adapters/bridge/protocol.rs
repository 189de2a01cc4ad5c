use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::ResultPage;
use crate::error::{AppError, ErrorBody};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BridgeRequest {
    pub v: u32,
    pub id: String,
    pub cmd: String,
    /// Target table; takes precedence over a `table_name` in the payload.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct BridgeResponse<T> {
    pub v: u32,
    pub id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl<T> BridgeResponse<T> {
    pub fn ok(v: u32, id: String, data: T) -> Self {
        Self {
            v,
            id,
            status: "ok",
            data: Some(data),
            error: None,
            http_status: None,
        }
    }

    pub fn err(v: u32, id: String, e: &AppError) -> Self {
        Self {
            v,
            id,
            status: "error",
            data: None,
            error: Some(e.body()),
            http_status: Some(e.http_status()),
        }
    }
}

// Payloads

/// URL-style select: every value is the raw query-string text.
#[derive(Debug, Default, Deserialize)]
pub struct GetPayload {
    #[serde(default)]
    pub query: HashMap<String, String>,
}

// Response data

#[derive(Debug, Serialize)]
pub struct SelectData {
    pub datas: Vec<crate::core::types::Record>,
    pub total_rows: Option<u64>,
    pub total_pages: Option<u64>,
}

impl From<ResultPage> for SelectData {
    fn from(page: ResultPage) -> Self {
        Self {
            datas: page.rows,
            total_rows: page.total_rows,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Datas<T> {
    pub datas: T,
}
