// =====================================================
// COMMON DATABASE TYPES AND STRUCTURES
// =====================================================

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

// --- Dialect ---
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum Dialect {
    Postgres,
    MySql,
    Mssql,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Postgres, Dialect::MySql, Dialect::Mssql];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Mssql => "mssql",
        }
    }

    /// DSN layout used when describing a connection of this dialect.
    pub fn dsn_template(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgresql://{user}:{password}@{endpoint}/{database}",
            Dialect::MySql => "mysql://{user}:{password}@{endpoint}/{database}",
            Dialect::Mssql => {
                "server=tcp:{endpoint};database={database};user id={user};password={password};TrustServerCertificate=true"
            }
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::MySql => 3306,
            Dialect::Mssql => 1433,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "mssql" => Ok(Dialect::Mssql),
            _ => Err(Error::Configuration(value.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dialect> for String {
    fn from(value: Dialect) -> Self {
        value.as_str().to_string()
    }
}

// --- Semantic Data Type ---
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    Numeric,
    Boolean,
    Text,
    Binary,
    Date,
    Timestamp,
    Time,
    Json,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Numeric => "numeric",
            DataType::Boolean => "boolean",
            DataType::Text => "text",
            DataType::Binary => "binary",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
            DataType::Time => "time",
            DataType::Json => "json",
        }
    }

    /// Maps a native type name as reported by a catalog or a driver onto the
    /// closed semantic set. Length/precision suffixes, `unsigned` and the
    /// `with(out) time zone` qualifiers are ignored. Returns `None` for types
    /// with no faithful semantic counterpart (arrays, user-defined types).
    pub fn from_native(native: &str) -> Option<DataType> {
        let normalized = normalize_native_type(native);
        if normalized.ends_with("[]") || normalized.starts_with('_') {
            return None;
        }

        let data_type = match normalized.as_str() {
            "int" | "integer" | "int2" | "int4" | "int8" | "bigint" | "smallint" | "tinyint"
            | "mediumint" | "serial" | "bigserial" | "smallserial" | "year" => DataType::Integer,

            "real" | "float" | "float4" | "float8" | "double" | "double precision" => {
                DataType::Float
            }

            "decimal" | "numeric" | "money" | "smallmoney" => DataType::Numeric,

            "bool" | "boolean" => DataType::Boolean,

            "char" | "character" | "varchar" | "character varying" | "nchar" | "nvarchar"
            | "bpchar" | "name" | "text" | "tinytext" | "mediumtext" | "longtext" | "ntext"
            | "citext" | "uuid" | "uniqueidentifier" | "enum" | "set" | "xml" | "interval"
            | "inet" | "cidr" | "macaddr" | "bit" | "bit varying" | "varbit" | "geometry"
            | "geography" | "point" | "linestring" | "polygon" => DataType::Text,

            "bytea" | "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob"
            | "longblob" | "image" => DataType::Binary,

            "date" => DataType::Date,

            "timestamp" | "timestamptz" | "datetime" | "datetime2" | "smalldatetime"
            | "datetimeoffset" => DataType::Timestamp,

            "time" | "timetz" => DataType::Time,

            "json" | "jsonb" => DataType::Json,

            _ => return None,
        };
        Some(data_type)
    }
}

fn normalize_native_type(native: &str) -> String {
    let mut lowered = native.trim().to_ascii_lowercase();
    if let Some(open) = lowered.find('(') {
        let close = lowered[open..].find(')').map(|pos| open + pos + 1);
        let tail = close.map(|pos| lowered[pos..].to_string()).unwrap_or_default();
        lowered = format!("{}{}", &lowered[..open], tail);
    }

    lowered
        .replace(" without time zone", "")
        .replace(" with time zone", "")
        .replace(" unsigned", "")
        .replace(" zerofill", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "integer" => Ok(DataType::Integer),
            "float" => Ok(DataType::Float),
            "numeric" => Ok(DataType::Numeric),
            "boolean" => Ok(DataType::Boolean),
            "text" => Ok(DataType::Text),
            "binary" => Ok(DataType::Binary),
            "date" => Ok(DataType::Date),
            "timestamp" => Ok(DataType::Timestamp),
            "time" => Ok(DataType::Time),
            "json" => Ok(DataType::Json),
            other => Err(Error::InvalidInput(format!("unknown data type '{}'", other))),
        }
    }
}

// --- Secret ---
/// Password wrapper that never shows its content in `Debug` output.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// --- Connection Configuration ---
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConnectionConfig {
    #[serde(alias = "db")]
    pub database: String,
    #[serde(alias = "dbType")]
    pub dialect: Dialect,
    #[serde(alias = "username")]
    pub user: String,
    #[serde(default)]
    pub password: Secret,
    #[serde(alias = "host")]
    pub endpoint: String,
    #[serde(default)]
    pub verbose: bool,
}

impl ConnectionConfig {
    pub fn new(
        database: impl Into<String>,
        dialect: Dialect,
        user: impl Into<String>,
        password: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            dialect,
            user: user.into(),
            password: Secret::new(password),
            endpoint: endpoint.into(),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// DSN for this connection with the password masked.
    pub fn redacted_dsn(&self) -> String {
        self.render_dsn("***")
    }

    fn render_dsn(&self, password: &str) -> String {
        self.dialect
            .dsn_template()
            .replace("{user}", &self.user)
            .replace("{password}", password)
            .replace("{endpoint}", &self.endpoint)
            .replace("{database}", &self.database)
    }

    pub fn parsed_endpoint(&self) -> Result<Endpoint, Error> {
        Endpoint::parse(&self.endpoint, self.dialect.default_port())
    }
}

// --- Endpoint ---
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Accepts `host`, `host:port` and `[v6-address]:port`.
    pub fn parse(endpoint: &str, default_port: u16) -> Result<Endpoint, Error> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::InvalidInput("endpoint must not be empty".into()));
        }

        let invalid_port =
            |port: &str| Error::InvalidInput(format!("invalid port '{}' in endpoint '{}'", port, endpoint));

        if let Some(rest) = endpoint.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| Error::InvalidInput(format!("unterminated '[' in endpoint '{}'", endpoint)))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => port.parse::<u16>().map_err(|_| invalid_port(port))?,
                None if tail.is_empty() => default_port,
                None => return Err(invalid_port(tail)),
            };
            return Ok(Endpoint { host: host.to_string(), port });
        }

        match endpoint.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => Ok(Endpoint {
                host: host.to_string(),
                port: port.parse::<u16>().map_err(|_| invalid_port(port))?,
            }),
            _ => Ok(Endpoint {
                host: endpoint.to_string(),
                port: default_port,
            }),
        }
    }
}

// --- Write Options ---
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Fail,
    Replace,
    Append,
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" | "fail-if-exists" | "fail_if_exists" => Ok(ConflictPolicy::Fail),
            "replace" => Ok(ConflictPolicy::Replace),
            "append" => Ok(ConflictPolicy::Append),
            other => Err(Error::InvalidInput(format!("unknown conflict policy '{}'", other))),
        }
    }
}

pub type TypeOverrides = HashMap<String, DataType>;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct WriteOptions {
    pub if_exists: ConflictPolicy,
    pub retrieve_types: bool,
    pub type_overrides: TypeOverrides,
    pub chunk_size: usize,
    pub verbose: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            if_exists: ConflictPolicy::default(),
            retrieve_types: false,
            type_overrides: TypeOverrides::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            verbose: false,
        }
    }
}

impl WriteOptions {
    pub fn new(if_exists: ConflictPolicy) -> Self {
        Self {
            if_exists,
            ..Self::default()
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn retrieve_types(mut self, retrieve: bool) -> Self {
        self.retrieve_types = retrieve;
        self
    }

    pub fn override_type(mut self, column: impl Into<String>, data_type: DataType) -> Self {
        self.type_overrides.insert(column.into(), data_type);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn needs_casting(&self) -> bool {
        self.retrieve_types || !self.type_overrides.is_empty()
    }
}
