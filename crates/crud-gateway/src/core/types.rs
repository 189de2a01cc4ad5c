use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// One result row keyed by the column names the cursor reported, in order.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(default)]
    pub decl_type: Option<String>,
    /// Coarse JSON type derived from the declared type.
    pub json_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_size: u64,
    pub page_number: u64,
}

impl Pagination {
    pub fn new(page_size: u64, page_number: u64) -> AppResult<Self> {
        if page_size == 0 {
            return Err(AppError::validation("page_size must be greater than 0"));
        }
        if page_number == 0 {
            return Err(AppError::validation("page_number must be at least 1"));
        }
        Ok(Self {
            page_size,
            page_number,
        })
    }

    pub fn offset(&self) -> AppResult<u64> {
        (self.page_number - 1)
            .checked_mul(self.page_size)
            .filter(|off| i64::try_from(*off).is_ok())
            .ok_or_else(|| AppError::validation("page_number is out of range"))
    }

    /// `ceil(total_rows / page_size)`; zero rows means zero pages.
    pub fn total_pages(&self, total_rows: u64) -> u64 {
        total_rows.div_ceil(self.page_size)
    }
}

/// Sort key written as `"col"` (ascending) or `"-col"` (descending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl TryFrom<String> for SortKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (column, descending) = match s.strip_prefix('-') {
            Some(rest) => (rest.to_string(), true),
            None => (s, false),
        };
        if column.is_empty() {
            return Err("empty sort key".into());
        }
        Ok(Self { column, descending })
    }
}

impl From<SortKey> for String {
    fn from(k: SortKey) -> Self {
        if k.descending {
            format!("-{}", k.column)
        } else {
            k.column
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectRequest {
    #[serde(default)]
    pub table_name: String,
    /// `None` selects every column.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub order_by: Vec<SortKey>,
    #[serde(default)]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub page_number: Option<u64>,
}

impl SelectRequest {
    /// Builds a request from URL-style parameters where `columns`, `params`
    /// and `order_by` arrive as JSON-encoded arrays.
    pub fn from_query_params(table: &str, query: &HashMap<String, String>) -> AppResult<Self> {
        fn json_array<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> AppResult<T> {
            serde_json::from_str(raw)
                .map_err(|e| AppError::validation(format!("{key} must be a JSON array: {e}")))
        }
        fn integer(key: &str, raw: &str) -> AppResult<u64> {
            raw.trim()
                .parse()
                .map_err(|_| AppError::validation(format!("{key} must be a positive integer")))
        }

        let mut req = SelectRequest {
            table_name: table.to_string(),
            ..Default::default()
        };
        if let Some(raw) = query.get("columns") {
            req.columns = Some(json_array("columns", raw)?);
        }
        if let Some(raw) = query.get("condition") {
            req.condition = Some(raw.clone());
        }
        if let Some(raw) = query.get("params") {
            req.params = json_array("params", raw)?;
        }
        if let Some(raw) = query.get("order_by") {
            req.order_by = json_array("order_by", raw)?;
        }
        if let Some(raw) = query.get("page_size") {
            req.page_size = Some(integer("page_size", raw)?);
        }
        if let Some(raw) = query.get("page_number") {
            req.page_number = Some(integer("page_number", raw)?);
        }
        Ok(req)
    }

    pub fn pagination(&self) -> AppResult<Option<Pagination>> {
        match (self.page_size, self.page_number) {
            (None, None) => Ok(None),
            (Some(size), Some(number)) => Pagination::new(size, number).map(Some),
            _ => Err(AppError::validation(
                "page_size and page_number must be given together",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertRequest {
    #[serde(default)]
    pub table_name: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Value>>,
    /// Column reported back per inserted row; defaults to `id`.
    #[serde(default)]
    pub returning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub table_name: String,
    pub set_values: serde_json::Map<String, Value>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub params: Vec<Value>,
    /// Explicit opt-in for an update without a condition.
    #[serde(default)]
    pub all_rows: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub params: Vec<Value>,
    /// Explicit opt-in for a delete without a condition.
    #[serde(default)]
    pub all_rows: bool,
}

/// Statement text using `%s` placeholders plus the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub query: BuiltStatement,
    /// Present iff pagination was requested.
    pub count: Option<BuiltStatement>,
    pub pagination: Option<Pagination>,
}

/// One statement executed once per row, all rows inside one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub sql: String,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    pub rows: Vec<Record>,
    pub total_rows: Option<u64>,
    pub total_pages: Option<u64>,
}
