use std::{path::PathBuf, time::Duration};

use rusqlite::Connection;
use serde_json::Value;

use super::{
    builder, executor,
    limits::Limits,
    pool::ConnectionPool,
    schema,
    types::{ColumnMeta, DeleteRequest, InsertRequest, ResultPage, SelectRequest, UpdateRequest},
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub db_path: PathBuf,
    pub pool_size: usize,
    pub busy_timeout_ms: u64,
    pub timeout_ms: u64,
    pub limits: Limits,
    /// Run the count and page queries of a paged select in one read snapshot.
    pub consistent_pagination: bool,
}

impl GatewayConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            pool_size: 4,
            busy_timeout_ms: 2_000,
            timeout_ms: 30_000,
            limits: Limits::default(),
            consistent_pagination: false,
        }
    }
}

/// Validates, builds and executes CRUD operations against one database.
///
/// Cloning is cheap; clones share the connection pool. Each call checks out
/// its own connection and runs the statement on the blocking thread pool.
/// Nothing is retried: an INSERT that times out may still have committed.
#[derive(Debug, Clone)]
pub struct Gateway {
    pool: ConnectionPool,
    limits: Limits,
    snapshot: bool,
    timeout: Duration,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> AppResult<Self> {
        let pool = ConnectionPool::new(&config.db_path, config.pool_size, config.busy_timeout_ms)?;
        tracing::info!(
            path=%pool.db_path().display(),
            pool_size=pool.max_size(),
            consistent_pagination=config.consistent_pagination,
            "gateway ready"
        );
        Ok(Self {
            pool,
            limits: config.limits,
            snapshot: config.consistent_pagination,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    pub async fn select(&self, req: SelectRequest) -> AppResult<ResultPage> {
        let table = req.table_name.clone();
        let plan = builder::build_select(&req, &self.limits)
            .map_err(|e| rejected("select", &table, e))?;
        tracing::debug!(op = "select", table = %table, sql = %plan.query.sql, "built statement");

        let snapshot = self.snapshot;
        let page = self
            .run("select", &table, move |conn| {
                executor::run_select(conn, &plan, snapshot)
            })
            .await?;
        tracing::info!(
            op = "select",
            table = %table,
            rows = page.rows.len(),
            total_rows = ?page.total_rows,
            "select ok"
        );
        Ok(page)
    }

    /// Returns the generated identifiers in input order.
    pub async fn insert(&self, req: InsertRequest) -> AppResult<Vec<Value>> {
        let table = req.table_name.clone();
        let plan = builder::build_insert(&req).map_err(|e| rejected("insert", &table, e))?;
        tracing::debug!(op = "insert", table = %table, sql = %plan.sql, "built statement");

        let ids = self
            .run("insert", &table, move |conn| executor::run_insert(conn, &plan))
            .await?;
        tracing::info!(op = "insert", table = %table, rows = ids.len(), "insert ok");
        Ok(ids)
    }

    /// Returns the number of rows changed; zero matches is not an error.
    pub async fn update(&self, req: UpdateRequest) -> AppResult<u64> {
        let table = req.table_name.clone();
        let stmt = builder::build_update(&req).map_err(|e| rejected("update", &table, e))?;
        tracing::debug!(op = "update", table = %table, sql = %stmt.sql, "built statement");

        let affected = self
            .run("update", &table, move |conn| executor::run_write(conn, &stmt))
            .await?;
        tracing::info!(op = "update", table = %table, affected, "update ok");
        Ok(affected)
    }

    pub async fn delete(&self, req: DeleteRequest) -> AppResult<u64> {
        let table = req.table_name.clone();
        let stmt = builder::build_delete(&req).map_err(|e| rejected("delete", &table, e))?;
        tracing::debug!(op = "delete", table = %table, sql = %stmt.sql, "built statement");

        let affected = self
            .run("delete", &table, move |conn| executor::run_write(conn, &stmt))
            .await?;
        tracing::info!(op = "delete", table = %table, affected, "delete ok");
        Ok(affected)
    }

    pub async fn tables(&self) -> AppResult<Vec<String>> {
        self.run("tables", "", |conn| schema::list_tables(conn)).await
    }

    pub async fn columns(&self, table: String) -> AppResult<Vec<ColumnMeta>> {
        let name = table.clone();
        self.run("columns", &name, move |conn| schema::list_columns(conn, &table))
            .await
    }

    async fn run<T, F>(&self, op: &'static str, table: &str, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let work = async move {
            let permit = pool.permit().await?;
            tokio::task::spawn_blocking(move || {
                let mut conn = pool.checkout(permit)?;
                f(&mut *conn)
            })
            .await
            .map_err(|e| AppError::Internal(format!("database task failed: {e}")))?
        };

        let res = match tokio::time::timeout(self.timeout, work).await {
            Ok(res) => res,
            Err(_) => Err(AppError::timeout(format!(
                "{op} did not finish within {}ms",
                self.timeout.as_millis()
            ))),
        };
        res.map_err(|e| failed(op, table, e))
    }
}

fn rejected(op: &str, table: &str, e: AppError) -> AppError {
    tracing::warn!(op, table, code = e.code(), error = %e, "request rejected");
    e
}

fn failed(op: &str, table: &str, e: AppError) -> AppError {
    if e.is_client_error() {
        tracing::warn!(op, table, code = e.code(), error = %e, "operation failed");
    } else {
        tracing::error!(op, table, code = e.code(), error = %e, "operation failed");
    }
    e
}
