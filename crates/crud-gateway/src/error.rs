use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of failures reported by the database driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DbErrorKind {
    Connectivity,
    Constraint,
    Timeout,
    Statement,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {message}")]
    Database { kind: DbErrorKind, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        // Only the driver message is kept; statement text stays out of errors.
        match e {
            rusqlite::Error::SqliteFailure(err, msg) => AppError::Database {
                kind: classify(err.code),
                message: msg.unwrap_or_else(|| err.to_string()),
            },
            // Display of this variant appends the statement and offset.
            rusqlite::Error::SqlInputError { error, msg, .. } => AppError::Database {
                kind: classify(error.code),
                message: msg,
            },
            other => match other.sqlite_error() {
                Some(err) => AppError::Database {
                    kind: classify(err.code),
                    message: err.to_string(),
                },
                None => AppError::Database {
                    kind: DbErrorKind::Statement,
                    message: other.to_string(),
                },
            },
        }
    }
}

fn classify(code: ErrorCode) -> DbErrorKind {
    match code {
        ErrorCode::ConstraintViolation => DbErrorKind::Constraint,
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DbErrorKind::Timeout,
        ErrorCode::CannotOpen
        | ErrorCode::NotADatabase
        | ErrorCode::SystemIoFailure
        | ErrorCode::DatabaseCorrupt
        | ErrorCode::PermissionDenied
        | ErrorCode::ReadOnly
        | ErrorCode::DiskFull => DbErrorKind::Connectivity,
        _ => DbErrorKind::Statement,
    }
}

/// Structured error object handed to callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        AppError::Database {
            kind: DbErrorKind::Timeout,
            message: msg.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database { kind, .. } => match kind {
                DbErrorKind::Connectivity => "DB_CONNECTIVITY",
                DbErrorKind::Constraint => "DB_CONSTRAINT",
                DbErrorKind::Timeout => "DB_TIMEOUT",
                DbErrorKind::Statement => "DB_STATEMENT",
            },
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "JSON_ERROR",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// Status an HTTP boundary should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation(_) | AppError::Json(_) => 400,
            AppError::Database { kind, .. } => match kind {
                DbErrorKind::Statement => 400,
                DbErrorKind::Constraint => 409,
                DbErrorKind::Connectivity => 503,
                DbErrorKind::Timeout => 504,
            },
            AppError::Io(_) | AppError::Internal(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
