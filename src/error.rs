// =====================================================
// ERROR TAXONOMY
// Every failure carries enough context to diagnose it without re-running
// =====================================================

use crate::db_types::{DataType, Dialect};
use thiserror::Error;

/// Boxed error produced by an underlying driver (sqlx, tiberius) or a test double.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unrecognized dialect '{0}'; expected one of postgres, mysql, mssql")]
    Configuration(String),

    #[error("connection to {dialect} database failed ({dsn}): {source}")]
    Connection {
        dialect: Dialect,
        dsn: String,
        #[source]
        source: DriverError,
    },

    #[error("{dialect} query failed: {source}\nquery: {query}")]
    Query {
        dialect: Dialect,
        query: String,
        #[source]
        source: DriverError,
    },

    #[error("table '{table}' does not exist")]
    NotFound { table: String },

    #[error("{operation} is not supported for {dialect}")]
    UnsupportedDialect {
        dialect: Dialect,
        operation: &'static str,
    },

    #[error("cannot cast column '{column}' from {from} to {to}: {reason}")]
    CastType {
        column: String,
        from: DataType,
        to: DataType,
        reason: String,
    },

    #[error(
        "failed writing {} ({rows_written} rows already committed): {source}",
        write_target(.table, .first_row, .last_row)
    )]
    Write {
        table: String,
        first_row: usize,
        last_row: usize,
        rows_written: usize,
        #[source]
        source: DriverError,
    },

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// `first_row > last_row` marks a failure before any row was sent.
fn write_target(table: &str, first_row: &usize, last_row: &usize) -> String {
    if first_row > last_row {
        format!("to '{}' before any rows were sent", table)
    } else {
        format!("rows {}-{} to '{}'", first_row, last_row, table)
    }
}

impl Error {
    /// Rows that were committed before the failure; non-zero only for `Write`.
    pub fn rows_written(&self) -> usize {
        match self {
            Error::Write { rows_written, .. } => *rows_written,
            _ => 0,
        }
    }
}
