use std::path::PathBuf;

use clap::Parser;

use crate::core::{limits::Limits, GatewayConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "crud-gateway", version)]
pub struct Args {
    /// SQLite database file to serve.
    #[arg(long, env = "CRUD_GATEWAY_DB")]
    pub db: PathBuf,

    /// Run as MCP server (JSON-RPC 2.0 over stdio) instead of the NDJSON bridge.
    #[arg(long)]
    pub mcp: bool,

    /// Logging level (stderr). Also supports RUST_LOG.
    #[arg(long, env = "CRUD_GATEWAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Largest page_size a select may request.
    #[arg(long, env = "CRUD_GATEWAY_MAX_PAGE_SIZE", default_value_t = 1000)]
    pub max_page_size: u64,

    /// Maximum number of connections checked out at once.
    #[arg(long, env = "CRUD_GATEWAY_POOL_SIZE", default_value_t = 4)]
    pub pool_size: usize,

    /// SQLite busy timeout applied to every connection.
    #[arg(long, default_value_t = 2_000)]
    pub busy_timeout_ms: u64,

    /// Soft timeout for a single request.
    #[arg(long, env = "CRUD_GATEWAY_TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Run the count and page queries of a paged select in one read snapshot.
    #[arg(long)]
    pub consistent_pagination: bool,
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        Self {
            db_path: args.db.clone(),
            pool_size: args.pool_size,
            busy_timeout_ms: args.busy_timeout_ms,
            timeout_ms: args.timeout_ms,
            limits: Limits {
                max_page_size: args.max_page_size,
            },
            consistent_pagination: args.consistent_pagination,
        }
    }
}
