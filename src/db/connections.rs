// =====================================================
// CONNECTION MANAGEMENT MODULE
// Builds dialect-specific handles and owns their lifecycle
// =====================================================

use super::sql_utils::{
    build_create_table, build_drop_table, build_insert_statements, build_table_exists_query,
    INSERT_ROWS_PER_STATEMENT,
};
use crate::db_types::{ConnectionConfig, Dialect};
use crate::error::{DriverError, Error, Result};
use crate::mssql::{self, MssqlClient};
use crate::mysql;
use crate::postgres;
use crate::table::{TabularResult, Value};
use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use std::fs;
use std::ops::Range;
use std::path::Path;

// =====================================================
// CONNECTION SEAM
// =====================================================

/// Everything the readers and writers need from a database link.
///
/// Implementors supply raw execution; the table-level operations have
/// dialect-aware default implementations on top of it. A connection is used
/// by one caller at a time, hence `&mut self` throughout.
#[async_trait]
pub trait SqlConnection: Send {
    fn dialect(&self) -> Dialect;

    /// DSN of the connection with the password masked.
    fn dsn(&self) -> &str;

    async fn fetch(&mut self, query: &str) -> std::result::Result<TabularResult, DriverError>;

    async fn execute(&mut self, statement: &str) -> std::result::Result<u64, DriverError>;

    /// Executes all statements in a single transaction.
    async fn execute_batch(&mut self, statements: &[String]) -> std::result::Result<u64, DriverError>;

    async fn table_exists(&mut self, table: &str) -> std::result::Result<bool, DriverError> {
        let query = build_table_exists_query(self.dialect(), table);
        let result = self.fetch(&query).await?;
        let count = result
            .columns()
            .first()
            .and_then(|column| column.values().first())
            .cloned();
        match count {
            Some(Value::Integer(n)) => Ok(n > 0),
            Some(Value::Numeric(n)) => Ok(n.trim() != "0"),
            other => Err(format!("unexpected table count result: {:?}", other).into()),
        }
    }

    async fn drop_table(&mut self, table: &str) -> std::result::Result<(), DriverError> {
        let statement = build_drop_table(self.dialect(), table);
        self.execute(&statement).await?;
        Ok(())
    }

    async fn create_table(&mut self, table: &str, data: &TabularResult) -> std::result::Result<(), DriverError> {
        let statement = build_create_table(self.dialect(), table, &data.schema());
        self.execute(&statement).await?;
        Ok(())
    }

    /// Inserts the rows of `data` within `rows` as one transaction.
    async fn insert_rows(
        &mut self,
        table: &str,
        data: &TabularResult,
        rows: Range<usize>,
    ) -> std::result::Result<u64, DriverError> {
        let statements =
            build_insert_statements(self.dialect(), table, data, rows, INSERT_ROWS_PER_STATEMENT)?;
        self.execute_batch(&statements).await
    }
}

// =====================================================
// DRIVER HANDLE
// =====================================================

enum Driver {
    Postgres(PgConnection),
    MySql(MySqlConnection),
    Mssql(Box<MssqlClient>),
}

/// An open, authenticated link to one database. Release it with
/// [`DbHandle::close`], or scope it with [`with_connection`].
pub struct DbHandle {
    dialect: Dialect,
    dsn: String,
    driver: Driver,
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("dialect", &self.dialect)
            .field("dsn", &self.dsn)
            .finish()
    }
}

impl DbHandle {
    pub async fn close(self) -> Result<()> {
        let dialect = self.dialect;
        let dsn = self.dsn;
        let closed: std::result::Result<(), DriverError> = match self.driver {
            Driver::Postgres(conn) => postgres::close(conn).await.map_err(Into::into),
            Driver::MySql(conn) => mysql::close(conn).await.map_err(Into::into),
            Driver::Mssql(client) => mssql::close(*client).await.map_err(Into::into),
        };
        closed.map_err(|source| Error::Connection { dialect, dsn, source })
    }
}

#[async_trait]
impl SqlConnection for DbHandle {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn dsn(&self) -> &str {
        &self.dsn
    }

    async fn fetch(&mut self, query: &str) -> std::result::Result<TabularResult, DriverError> {
        match &mut self.driver {
            Driver::Postgres(conn) => Ok(postgres::fetch(conn, query).await?),
            Driver::MySql(conn) => Ok(mysql::fetch(conn, query).await?),
            Driver::Mssql(client) => Ok(mssql::fetch(client, query).await?),
        }
    }

    async fn execute(&mut self, statement: &str) -> std::result::Result<u64, DriverError> {
        match &mut self.driver {
            Driver::Postgres(conn) => Ok(postgres::execute(conn, statement).await?),
            Driver::MySql(conn) => Ok(mysql::execute(conn, statement).await?),
            Driver::Mssql(client) => Ok(mssql::execute(client, statement).await?),
        }
    }

    async fn execute_batch(&mut self, statements: &[String]) -> std::result::Result<u64, DriverError> {
        match &mut self.driver {
            Driver::Postgres(conn) => Ok(postgres::execute_batch(conn, statements).await?),
            Driver::MySql(conn) => Ok(mysql::execute_batch(conn, statements).await?),
            Driver::Mssql(client) => Ok(mssql::execute_batch(client, statements).await?),
        }
    }
}

// =====================================================
// CONNECTION FACTORY
// =====================================================

/// Opens a handle for `config`. The password never reaches a log line; the
/// status line printed in verbose mode names only dialect, endpoint and
/// database.
pub async fn connect(config: &ConnectionConfig) -> Result<DbHandle> {
    let dialect = config.dialect;
    let dsn = config.redacted_dsn();
    let endpoint = config.parsed_endpoint()?;

    let connection_error = |source: DriverError| Error::Connection {
        dialect,
        dsn: dsn.clone(),
        source,
    };

    let driver = match dialect {
        Dialect::Postgres => Driver::Postgres(
            postgres::connect(config, &endpoint)
                .await
                .map_err(|e| connection_error(e.into()))?,
        ),
        Dialect::MySql => Driver::MySql(
            mysql::connect(config, &endpoint)
                .await
                .map_err(|e| connection_error(e.into()))?,
        ),
        Dialect::Mssql => Driver::Mssql(Box::new(
            mssql::connect(config, &endpoint)
                .await
                .map_err(|e| connection_error(e.into()))?,
        )),
    };

    if config.verbose {
        log::info!(
            "Connected to {} database '{}' at {}:{}",
            dialect,
            config.database,
            endpoint.host,
            endpoint.port
        );
    }

    Ok(DbHandle {
        dialect,
        dsn,
        driver,
    })
}

/// Parses the dialect name before connecting, so an unknown dialect is a
/// configuration error and never produces a handle.
pub async fn connect_with(
    database: &str,
    dialect: &str,
    user: &str,
    password: &str,
    endpoint: &str,
    verbose: bool,
) -> Result<DbHandle> {
    let dialect: Dialect = dialect.parse()?;
    let config = ConnectionConfig::new(database, dialect, user, password, endpoint).with_verbose(verbose);
    connect(&config).await
}

/// Scoped acquisition: connects, runs `operation`, and closes the handle
/// whether or not the operation succeeded. An operation error wins over a
/// close error.
pub async fn with_connection<T, F>(config: &ConnectionConfig, operation: F) -> Result<T>
where
    F: for<'c> FnOnce(&'c mut DbHandle) -> BoxFuture<'c, Result<T>>,
{
    let mut handle = connect(config).await?;
    let outcome = operation(&mut handle).await;
    let closed = handle.close().await;

    match (outcome, closed) {
        (Err(e), Err(close_error)) => {
            log::warn!("Closing connection after a failed operation also failed: {}", close_error);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(close_error)) => Err(close_error),
        (Ok(value), Ok(())) => Ok(value),
    }
}

// =====================================================
// CONNECTION FILE STORAGE
// =====================================================

/// Reads a JSON array of connection configurations.
pub fn load_connections(path: impl AsRef<Path>) -> Result<Vec<ConnectionConfig>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::InvalidInput(format!("Failed to read connections file {}: {}", path.display(), e))
    })?;
    parse_connections(&content)
}

/// Parses connection configurations; an unknown dialect name is reported as
/// a configuration error rather than a generic parse failure.
pub fn parse_connections(content: &str) -> Result<Vec<ConnectionConfig>> {
    let invalid = |e: serde_json::Error| Error::InvalidInput(format!("Failed to parse connections: {}", e));

    let entries: Vec<serde_json::Value> = serde_json::from_str(content).map_err(invalid)?;
    entries
        .into_iter()
        .map(|entry| {
            let dialect = entry
                .get("dialect")
                .or_else(|| entry.get("dbType"))
                .and_then(serde_json::Value::as_str);
            if let Some(name) = dialect {
                name.parse::<Dialect>()?;
            }
            serde_json::from_value(entry).map_err(invalid)
        })
        .collect()
}
