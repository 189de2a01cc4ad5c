use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};

use crate::{
    core::{
        types::{DeleteRequest, InsertRequest, SelectRequest, UpdateRequest},
        Gateway,
    },
    error::{AppError, AppResult},
};

/// MCP server (JSON-RPC 2.0 over stdio).
///
/// Supports `initialize`, `tools/list` and `tools/call` with one tool per
/// CRUD operation plus schema lookups.
pub async fn run(gateway: Gateway) -> AppResult<()> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut stdout = io::BufWriter::new(io::stdout());
    let mut line = String::new();

    loop {
        line.clear();
        let n = stdin.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }

        if let Some(resp) = handle_message(raw, &gateway).await {
            write_line(&mut stdout, &resp).await?;
        }
    }

    Ok(())
}

/// Handles one JSON-RPC message; notifications yield no response.
pub async fn handle_message(raw: &str, gateway: &Gateway) -> Option<Value> {
    let msg: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return Some(jsonrpc_error(Value::Null, -32700, format!("parse error: {e}"))),
    };

    let id = msg.get("id").cloned().unwrap_or(Value::Null);
    if id.is_null() {
        return None;
    }

    let Some(method) = msg.get("method").and_then(|m| m.as_str()) else {
        return Some(jsonrpc_error(id, -32600, "invalid request: missing method".into()));
    };
    let params = msg.get("params").cloned().unwrap_or(Value::Null);

    Some(match method {
        "initialize" => handle_initialize(id),
        "tools/list" => handle_tools_list(id),
        "tools/call" => handle_tools_call(id, params, gateway).await,
        _ => jsonrpc_error(id, -32601, format!("method not found: {method}")),
    })
}

fn handle_initialize(id: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "serverInfo": {
                "name": "crud-gateway",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": { "listChanged": false }
            }
        }
    })
}

fn handle_tools_list(id: Value) -> Value {
    let filter = serde_json::json!({
        "table_name": { "type": "string" },
        "condition": { "type": "string", "description": "WHERE fragment using %s placeholders" },
        "params": { "type": "array" }
    });
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "tools": [
                {
                    "name": "select_rows",
                    "description": "Select rows from a table with optional filter, ordering and pagination.",
                    "inputSchema": {
                        "type": "object",
                        "properties": merge(&filter, serde_json::json!({
                            "columns": { "type": "array", "items": { "type": "string" } },
                            "order_by": { "type": "array", "items": { "type": "string" } },
                            "page_size": { "type": "integer", "minimum": 1 },
                            "page_number": { "type": "integer", "minimum": 1 }
                        })),
                        "required": ["table_name"]
                    }
                },
                {
                    "name": "insert_rows",
                    "description": "Insert a batch of rows atomically and return their ids.",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "table_name": { "type": "string" },
                            "columns": { "type": "array", "items": { "type": "string" } },
                            "values": { "type": "array", "items": { "type": "array" } },
                            "returning": { "type": "string" }
                        },
                        "required": ["table_name", "columns", "values"]
                    }
                },
                {
                    "name": "update_rows",
                    "description": "Update matching rows and return the affected count.",
                    "inputSchema": {
                        "type": "object",
                        "properties": merge(&filter, serde_json::json!({
                            "set_values": { "type": "object" },
                            "all_rows": { "type": "boolean" }
                        })),
                        "required": ["table_name", "set_values"]
                    }
                },
                {
                    "name": "delete_rows",
                    "description": "Delete matching rows and return the affected count.",
                    "inputSchema": {
                        "type": "object",
                        "properties": merge(&filter, serde_json::json!({
                            "all_rows": { "type": "boolean" }
                        })),
                        "required": ["table_name"]
                    }
                },
                {
                    "name": "list_tables",
                    "description": "List user tables.",
                    "inputSchema": { "type": "object", "properties": {} }
                },
                {
                    "name": "describe_table",
                    "description": "List a table's columns with declared and JSON types.",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "table_name": { "type": "string" } },
                        "required": ["table_name"]
                    }
                }
            ]
        }
    })
}

async fn handle_tools_call(id: Value, params: Value, gateway: &Gateway) -> Value {
    let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
        return jsonrpc_error(id, -32602, "invalid params: missing name".into());
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let res = match name {
        "select_rows" => tool_select(arguments, gateway).await,
        "insert_rows" => tool_insert(arguments, gateway).await,
        "update_rows" => tool_update(arguments, gateway).await,
        "delete_rows" => tool_delete(arguments, gateway).await,
        "list_tables" => gateway
            .tables()
            .await
            .map(|t| serde_json::json!({ "tables": t })),
        "describe_table" => tool_describe(arguments, gateway).await,
        other => Err(AppError::validation(format!("unknown tool: {other}"))),
    };

    match res {
        Ok(structured) => {
            let text = serde_json::to_string_pretty(&structured).unwrap_or_else(|_| "<result>".into());
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [{ "type": "text", "text": text }],
                    "structuredContent": structured,
                    "isError": false
                }
            })
        }
        Err(e) => serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "content": [{ "type": "text", "text": format!("{}: {}", e.code(), e) }],
                "structuredContent": { "error": e.body() },
                "isError": true
            }
        }),
    }
}

async fn tool_select(arguments: Value, gateway: &Gateway) -> AppResult<Value> {
    let req: SelectRequest = parse_args(arguments)?;
    let page = gateway.select(req).await?;
    Ok(serde_json::json!({
        "datas": page.rows,
        "total_rows": page.total_rows,
        "total_pages": page.total_pages
    }))
}

async fn tool_insert(arguments: Value, gateway: &Gateway) -> AppResult<Value> {
    let req: InsertRequest = parse_args(arguments)?;
    let ids = gateway.insert(req).await?;
    Ok(serde_json::json!({ "datas": ids }))
}

async fn tool_update(arguments: Value, gateway: &Gateway) -> AppResult<Value> {
    let req: UpdateRequest = parse_args(arguments)?;
    let affected = gateway.update(req).await?;
    Ok(serde_json::json!({ "datas": affected }))
}

async fn tool_delete(arguments: Value, gateway: &Gateway) -> AppResult<Value> {
    let req: DeleteRequest = parse_args(arguments)?;
    let affected = gateway.delete(req).await?;
    Ok(serde_json::json!({ "datas": affected }))
}

async fn tool_describe(arguments: Value, gateway: &Gateway) -> AppResult<Value> {
    let table = arguments
        .get("table_name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::validation("missing or invalid field: table_name"))?;
    let columns = gateway.columns(table.clone()).await?;
    Ok(serde_json::json!({ "table_name": table, "columns": columns }))
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> AppResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| AppError::validation(format!("invalid arguments: {e}")))
}

fn merge(base: &Value, extra: Value) -> Value {
    let mut out = base.clone();
    if let (Some(o), Value::Object(extra)) = (out.as_object_mut(), extra) {
        o.extend(extra);
    }
    out
}

async fn write_line(w: &mut io::BufWriter<io::Stdout>, v: &Value) -> AppResult<()> {
    let mut buf = serde_json::to_vec(v)?;
    buf.push(b'\n');
    w.write_all(&buf).await?;
    w.flush().await?;
    Ok(())
}

fn jsonrpc_error(id: Value, code: i64, message: String) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}
