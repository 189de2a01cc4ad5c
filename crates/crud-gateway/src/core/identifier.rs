use crate::error::{AppError, AppResult};

/// Longest identifier accepted; matches PostgreSQL's NAMEDATALEN - 1.
pub const MAX_IDENTIFIER_LEN: usize = 63;

// Words that would change statement structure if spliced in as a bare name.
const RESERVED: &[&str] = &[
    "all", "alter", "and", "as", "attach", "between", "by", "case", "create", "delete",
    "detach", "distinct", "drop", "else", "exists", "from", "group", "having", "in",
    "insert", "intersect", "into", "is", "join", "like", "limit", "not", "null", "offset",
    "on", "or", "order", "pragma", "returning", "select", "set", "table", "then", "union",
    "update", "values", "when", "where",
];

pub(crate) fn is_safe_identifier(s: &str) -> bool {
    // [A-Za-z_][A-Za-z0-9_]*
    if s.len() > MAX_IDENTIFIER_LEN {
        return false;
    }
    let mut chars = s.chars();
    let Some(first) = chars.next() else { return false };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(s))
}

pub(crate) fn is_safe_table_ref(s: &str) -> bool {
    // `table` or `schema.table`
    let mut parts = s.split('.');
    let Some(first) = parts.next() else { return false };
    if !is_safe_identifier(first) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(second) => parts.next().is_none() && is_safe_identifier(second),
    }
}

/// Returns the table reference unchanged if it passes the allow-list.
pub fn table(name: &str) -> AppResult<&str> {
    if is_safe_table_ref(name) {
        Ok(name)
    } else {
        Err(AppError::validation(format!("invalid table identifier: {name:?}")))
    }
}

/// Returns the column name unchanged if it passes the allow-list.
pub fn column(name: &str) -> AppResult<&str> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(AppError::validation(format!("invalid column identifier: {name:?}")))
    }
}

/// Validates a non-empty list of distinct column names.
pub fn columns<'a, I>(names: I) -> AppResult<Vec<&'a str>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut out: Vec<&str> = Vec::new();
    for name in names {
        let name = column(name)?;
        if out.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
            return Err(AppError::validation(format!("duplicate column: {name}")));
        }
        out.push(name);
    }
    if out.is_empty() {
        return Err(AppError::validation("column list must not be empty"));
    }
    Ok(out)
}
