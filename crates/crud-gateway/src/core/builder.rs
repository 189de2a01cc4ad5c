//! Translates operation descriptors into `%s`-parameterized statements.
//!
//! Values only ever travel as bound parameters. Table and column names are
//! spliced into the text, so each one must pass [`identifier`] first; the
//! condition fragment is checked by [`placeholders`]. Nothing here touches a
//! connection, so every rejection happens before the database sees a byte.

use serde_json::Value;

use super::{
    identifier,
    limits::Limits,
    placeholders,
    types::{
        BuiltStatement, DeleteRequest, InsertPlan, InsertRequest, SelectPlan, SelectRequest,
        SortKey, UpdateRequest,
    },
};
use crate::error::{AppError, AppResult};

const DEFAULT_RETURNING: &str = "id";

pub fn build_select(req: &SelectRequest, limits: &Limits) -> AppResult<SelectPlan> {
    let table = identifier::table(&req.table_name)?;
    let columns = match &req.columns {
        Some(cols) => identifier::columns(cols)?.join(", "),
        None => "*".to_string(),
    };
    let filter = filter(req.condition.as_deref(), &req.params)?;
    let order_by = order_by(&req.order_by)?;
    let pagination = req.pagination()?;

    let mut sql = format!("SELECT {columns} FROM {table}");
    let mut count_sql = format!("SELECT COUNT(*) FROM {table}");
    if let Some(cond) = filter {
        sql.push_str(&format!(" WHERE {cond}"));
        count_sql.push_str(&format!(" WHERE {cond}"));
    }
    if let Some(order_by) = order_by {
        sql.push_str(&format!(" ORDER BY {order_by}"));
    }

    let count = match &pagination {
        Some(page) => {
            limits.check_page(page)?;
            sql.push_str(&format!(" LIMIT {} OFFSET {}", page.page_size, page.offset()?));
            Some(BuiltStatement {
                sql: count_sql,
                params: req.params.clone(),
            })
        }
        None => None,
    };

    Ok(SelectPlan {
        query: BuiltStatement {
            sql,
            params: req.params.clone(),
        },
        count,
        pagination,
    })
}

pub fn build_insert(req: &InsertRequest) -> AppResult<InsertPlan> {
    let table = identifier::table(&req.table_name)?;
    let columns = identifier::columns(&req.columns)?;
    let returning = identifier::column(req.returning.as_deref().unwrap_or(DEFAULT_RETURNING))?;

    if req.values.is_empty() {
        return Err(AppError::validation("values must contain at least one row"));
    }
    for (i, row) in req.values.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(AppError::validation(format!(
                "row {i} has {} values but {} columns were named",
                row.len(),
                columns.len()
            )));
        }
        check_scalars(row, "values")?;
    }

    let template = vec!["%s"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({template}) RETURNING {returning}",
        columns.join(", ")
    );
    Ok(InsertPlan {
        sql,
        rows: req.values.clone(),
    })
}

pub fn build_update(req: &UpdateRequest) -> AppResult<BuiltStatement> {
    let table = identifier::table(&req.table_name)?;
    let columns = identifier::columns(req.set_values.keys())
        .map_err(|e| match e {
            AppError::Validation(msg) => AppError::validation(format!("set_values: {msg}")),
            other => other,
        })?;
    let values: Vec<Value> = req.set_values.values().cloned().collect();
    check_scalars(&values, "set_values")?;

    let filter = filter(req.condition.as_deref(), &req.params)?;
    require_scope("UPDATE", filter, req.all_rows)?;

    let assignments = columns
        .iter()
        .map(|c| format!("{c} = %s"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("UPDATE {table} SET {assignments}");
    if let Some(cond) = filter {
        sql.push_str(&format!(" WHERE {cond}"));
    }

    let mut params = values;
    params.extend(req.params.iter().cloned());
    Ok(BuiltStatement { sql, params })
}

pub fn build_delete(req: &DeleteRequest) -> AppResult<BuiltStatement> {
    let table = identifier::table(&req.table_name)?;
    let filter = filter(req.condition.as_deref(), &req.params)?;
    require_scope("DELETE", filter, req.all_rows)?;

    let mut sql = format!("DELETE FROM {table}");
    if let Some(cond) = filter {
        sql.push_str(&format!(" WHERE {cond}"));
    }
    Ok(BuiltStatement {
        sql,
        params: req.params.clone(),
    })
}

/// Normalizes the condition and checks it against the parameter list.
fn filter<'a>(condition: Option<&'a str>, params: &[Value]) -> AppResult<Option<&'a str>> {
    let condition = condition.map(str::trim).filter(|c| !c.is_empty());
    let Some(cond) = condition else {
        if !params.is_empty() {
            return Err(AppError::validation("params were given without a condition"));
        }
        return Ok(None);
    };

    let expected = placeholders::count(cond)?;
    if expected != params.len() {
        return Err(AppError::validation(format!(
            "condition has {expected} placeholders but {} params were given",
            params.len()
        )));
    }
    check_scalars(params, "params")?;
    Ok(Some(cond))
}

fn require_scope(op: &str, filter: Option<&str>, all_rows: bool) -> AppResult<()> {
    match (filter, all_rows) {
        (Some(_), false) | (None, true) => Ok(()),
        (None, false) => Err(AppError::validation(format!(
            "{op} requires a condition; set all_rows to affect every row"
        ))),
        (Some(_), true) => Err(AppError::validation(format!(
            "{op} cannot combine a condition with all_rows"
        ))),
    }
}

fn order_by(keys: &[SortKey]) -> AppResult<Option<String>> {
    if keys.is_empty() {
        return Ok(None);
    }
    let parts = keys
        .iter()
        .map(|k| {
            let col = identifier::column(&k.column)?;
            Ok(if k.descending {
                format!("{col} DESC")
            } else {
                col.to_string()
            })
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Some(parts.join(", ")))
}

fn check_scalars(values: &[Value], what: &str) -> AppResult<()> {
    match values
        .iter()
        .position(|v| matches!(v, Value::Array(_) | Value::Object(_)))
    {
        Some(i) => Err(AppError::validation(format!(
            "{what}[{i}] must be a string, number, boolean or null"
        ))),
        None => Ok(()),
    }
}
