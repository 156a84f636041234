//! Engine error taxonomy
//!
//! Only schema problems are fatal. Unparsable numbers and dangling join keys
//! are absorbed into the data (zero / null) and surfaced as plain values so
//! callers can build their own data-quality report.

use polars::prelude::PolarsError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("table '{table}' is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl EngineError {
    pub fn schema(table: &str, column: &str) -> Self {
        Self::Schema {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

/// A numeric cell that failed to parse and was reported as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseWarning {
    pub table: String,
    pub column: String,
    /// Zero-based row index in the source table.
    pub row: usize,
    pub raw: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} row {}: '{}' is not a number, using 0",
            self.table, self.column, self.row, self.raw
        )
    }
}

/// A join key with no match on the right-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UnresolvedReference {
    pub table: String,
    pub column: String,
    pub key: String,
}

impl UnresolvedReference {
    pub fn new(table: &str, column: &str, key: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} = '{}' has no match", self.table, self.column, self.key)
    }
}
