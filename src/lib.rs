// Tabular data in and out of PostgreSQL, MySQL and SQL Server.

pub mod error;
pub mod db_types;
pub mod table;

// Database modules
pub mod mysql;
pub mod postgres;
pub mod mssql;
pub mod db;

pub mod data_export;
pub mod toolkit;

pub use db::{
    connect, connect_with, inspect_column_types, load_connections, read_table, reconcile, with_connection,
    write_table, CastingPlan, ColumnTypeMap, DbHandle, SqlConnection,
};
pub use db_types::{ConflictPolicy, ConnectionConfig, DataType, Dialect, WriteOptions};
pub use error::{Error, Result};
pub use table::{Column, TabularResult, Value};
