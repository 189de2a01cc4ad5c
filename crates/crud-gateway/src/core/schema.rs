use rusqlite::{Connection, Row};

use super::identifier;
use crate::core::types::ColumnMeta;
use crate::error::{AppError, AppResult, DbErrorKind};

pub fn list_tables(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_columns(conn: &Connection, table: &str) -> AppResult<Vec<ColumnMeta>> {
    // PRAGMA arguments cannot be bound, so the name goes through the allow-list.
    let table = identifier::table(table)?;
    let sql = match table.split_once('.') {
        Some((schema, name)) => format!("PRAGMA {schema}.table_info({name})"),
        None => format!("PRAGMA table_info({table})"),
    };
    let mut stmt = conn.prepare(&sql)?;
    let cols = stmt
        .query_map([], |row: &Row<'_>| {
            let name: String = row.get("name")?;
            let decl_type: Option<String> = row.get("type")?;
            let decl_type = decl_type.filter(|t| !t.is_empty());
            Ok(ColumnMeta {
                json_type: json_type(decl_type.as_deref()).to_string(),
                name,
                decl_type,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if cols.is_empty() {
        return Err(AppError::Database {
            kind: DbErrorKind::Statement,
            message: format!("no such table: {table}"),
        });
    }
    Ok(cols)
}

/// Maps a declared column type onto the JSON type its values come back as,
/// following SQLite's column affinity rules.
pub fn json_type(decl_type: Option<&str>) -> &'static str {
    let Some(t) = decl_type else { return "unknown" };
    let t = t.to_ascii_uppercase();
    if t.starts_with("BOOL") {
        "boolean"
    } else if t.contains("INT") {
        "integer"
    } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
        "string"
    } else if t.contains("BLOB") {
        "blob"
    } else if ["REAL", "FLOA", "DOUB", "NUMERIC", "DECIMAL"]
        .iter()
        .any(|k| t.contains(k))
    {
        "number"
    } else {
        "unknown"
    }
}
