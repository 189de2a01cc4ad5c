use base64::{engine::general_purpose, Engine as _};
use rusqlite::{params_from_iter, types::ValueRef, Connection, Row, TransactionBehavior};
use serde_json::Value;

use super::{
    placeholders, schema,
    types::{BuiltStatement, InsertPlan, Record, ResultPage, SelectPlan},
};
use crate::error::{AppError, AppResult, DbErrorKind};

/// Runs the count (when paging) and then the row query.
///
/// With `snapshot` both statements share one read transaction; without it
/// they are independent round trips and a concurrent write between them can
/// make `total_rows` disagree with the page.
pub fn run_select(conn: &mut Connection, plan: &SelectPlan, snapshot: bool) -> AppResult<ResultPage> {
    if snapshot {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let page = select_on(&tx, plan)?;
        tx.commit()?;
        Ok(page)
    } else {
        select_on(conn, plan)
    }
}

fn select_on(conn: &Connection, plan: &SelectPlan) -> AppResult<ResultPage> {
    let total_rows = match &plan.count {
        Some(count) => Some(run_count(conn, count)?),
        None => None,
    };

    let sql = placeholders::render(&plan.query.sql)?.sql;
    let mut stmt = conn.prepare(&sql)?;
    ensure_readonly(&stmt)?;
    let cols: Vec<OutColumn> = stmt
        .columns()
        .iter()
        .map(|c| OutColumn {
            name: c.name().to_string(),
            boolean: schema::json_type(c.decl_type()) == "boolean",
        })
        .collect();

    let mut rows = Vec::new();
    let mut r = stmt.query(params_from_iter(plan.query.params.iter().map(to_sql_value)))?;
    while let Some(row) = r.next()? {
        rows.push(row_to_record(row, &cols)?);
    }

    let total_pages = match (&plan.pagination, total_rows) {
        (Some(page), Some(total)) => Some(page.total_pages(total)),
        _ => None,
    };

    Ok(ResultPage {
        rows,
        total_rows,
        total_pages,
    })
}

fn run_count(conn: &Connection, count: &BuiltStatement) -> AppResult<u64> {
    let sql = placeholders::render(&count.sql)?.sql;
    let mut stmt = conn.prepare(&sql)?;
    ensure_readonly(&stmt)?;
    let n: i64 = stmt.query_row(params_from_iter(count.params.iter().map(to_sql_value)), |r| {
        r.get(0)
    })?;
    Ok(n.max(0) as u64)
}

fn ensure_readonly(stmt: &rusqlite::Statement<'_>) -> AppResult<()> {
    if stmt.readonly() {
        Ok(())
    } else {
        Err(AppError::Database {
            kind: DbErrorKind::Statement,
            message: "select statement is not read-only".into(),
        })
    }
}

/// Inserts every row in one transaction and returns the generated
/// identifiers in input order. Any failing row rolls back the whole batch.
pub fn run_insert(conn: &mut Connection, plan: &InsertPlan) -> AppResult<Vec<Value>> {
    let sql = placeholders::render(&plan.sql)?.sql;
    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(plan.rows.len());
    {
        let mut stmt = tx.prepare(&sql)?;
        for (i, row) in plan.rows.iter().enumerate() {
            let id = stmt
                .query_row(params_from_iter(row.iter().map(to_sql_value)), |r| {
                    r.get_ref(0).map(value_ref_to_json)
                })
                .map_err(|e| at_row(i, e.into()))?;
            ids.push(id);
        }
    }
    tx.commit()?;
    Ok(ids)
}

/// Executes an UPDATE or DELETE and returns the affected-row count.
pub fn run_write(conn: &mut Connection, stmt: &BuiltStatement) -> AppResult<u64> {
    let sql = placeholders::render(&stmt.sql)?.sql;
    let tx = conn.transaction()?;
    let changes = tx.execute(&sql, params_from_iter(stmt.params.iter().map(to_sql_value)))?;
    tx.commit()?;
    Ok(changes as u64)
}

fn at_row(i: usize, e: AppError) -> AppError {
    match e {
        AppError::Database { kind, message } => AppError::Database {
            kind,
            message: format!("row {i}: {message}"),
        },
        other => other,
    }
}

pub(crate) fn to_sql_value(v: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match v {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Sql::Integer(i),
            None => Sql::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Sql::Text(s.clone()),
        // Rejected by the builder; kept total for completeness.
        other => Sql::Text(other.to_string()),
    }
}

fn value_ref_to_json(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(x) => Value::from(x),
        ValueRef::Real(x) => Value::from(x),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => serde_json::json!({
            "$type": "blob",
            "base64": general_purpose::STANDARD.encode(b),
            "size": b.len()
        }),
    }
}

/// Result column as seen by the cursor.
struct OutColumn {
    name: String,
    /// Declared BOOLEAN; stored as 0/1 and read back as `true`/`false`.
    boolean: bool,
}

fn row_to_record(row: &Row<'_>, cols: &[OutColumn]) -> AppResult<Record> {
    let mut out = Record::with_capacity(cols.len());
    for (i, col) in cols.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Integer(x @ (0 | 1)) if col.boolean => Value::Bool(x == 1),
            other => value_ref_to_json(other),
        };
        out.insert(col.name.clone(), value);
    }
    Ok(out)
}
