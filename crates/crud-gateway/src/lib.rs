//! Generic CRUD gateway over a SQLite database.
//!
//! Callers describe an operation against a table named at request time; the
//! [`crate::core::builder`] turns it into a parameterized statement after checking
//! every identifier against an allow-list, and the [`crate::core::executor`] runs it
//! on a pooled connection and normalizes the rows.

pub mod adapters;
pub mod cli;
pub mod core;
pub mod error;
pub mod logging;

pub use crate::core::{
    types::{DeleteRequest, InsertRequest, Record, ResultPage, SelectRequest, UpdateRequest},
    Gateway, GatewayConfig,
};
pub use crate::error::{AppError, AppResult, ErrorBody};
