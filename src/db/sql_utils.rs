// =====================================================
// SQL UTILITIES MODULE
// Dialect-aware quoting, literals and statement builders
// =====================================================

use crate::db_types::{DataType, Dialect};
use crate::table::{canonical_decimal, special_numeric, TabularResult, Value};
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use std::ops::Range;

/// Upper bound of rows rendered into one `INSERT ... VALUES` statement.
/// SQL Server rejects more than 1000 row constructors per statement.
pub const INSERT_ROWS_PER_STATEMENT: usize = 1_000;

pub fn quote_identifier_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn quote_identifier_postgres(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_identifier_mssql(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

pub fn quote_identifier(dialect: Dialect, name: &str) -> String {
    match dialect {
        Dialect::Postgres => quote_identifier_postgres(name),
        Dialect::MySql => quote_identifier_mysql(name),
        Dialect::Mssql => quote_identifier_mssql(name),
    }
}

/// Splits `schema.table` into its parts; a bare name has no schema.
pub fn split_table_name(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) if !schema.is_empty() && !name.is_empty() => (Some(schema), name),
        _ => (None, table),
    }
}

pub fn qualified_table_name(dialect: Dialect, table: &str) -> String {
    match split_table_name(table) {
        (Some(schema), name) => format!(
            "{}.{}",
            quote_identifier(dialect, schema),
            quote_identifier(dialect, name)
        ),
        (None, name) => quote_identifier(dialect, name),
    }
}

pub fn escape_sql_string(dialect: Dialect, value: &str) -> String {
    match dialect {
        Dialect::MySql => value.replace('\\', "\\\\").replace('\'', "''"),
        Dialect::Postgres | Dialect::Mssql => value.replace('\'', "''"),
    }
}

fn string_literal(dialect: Dialect, value: &str) -> String {
    match dialect {
        Dialect::Mssql => format!("N'{}'", escape_sql_string(dialect, value)),
        _ => format!("'{}'", escape_sql_string(dialect, value)),
    }
}

/// Renders `value` as a SQL literal.
///
/// Non-finite floats and numerics only have a literal on postgres; other
/// dialects get an error instead of a substituted NULL.
pub fn value_to_sql_literal(dialect: Dialect, value: &Value) -> Result<String, String> {
    let literal = match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Float(v) if v.is_finite() => format!("{:?}", v),
        Value::Float(v) => non_finite_literal(dialect, float_token(*v), "float8")?,
        Value::Numeric(v) => match (canonical_decimal(v), special_numeric(v)) {
            (Some(decimal), _) => decimal,
            (None, Some(token)) => non_finite_literal(dialect, token, "numeric")?,
            (None, None) => return Err(format!("'{}' is not decimal text", v)),
        },
        Value::Boolean(v) => match (dialect, v) {
            (Dialect::Mssql, true) => "1".to_string(),
            (Dialect::Mssql, false) => "0".to_string(),
            (_, true) => "TRUE".to_string(),
            (_, false) => "FALSE".to_string(),
        },
        Value::Text(v) => string_literal(dialect, v),
        Value::Binary(bytes) => match dialect {
            Dialect::Postgres => format!("'\\x{}'::bytea", hex::encode(bytes)),
            Dialect::MySql => format!("X'{}'", hex::encode(bytes)),
            Dialect::Mssql => format!("0x{}", hex::encode(bytes)),
        },
        Value::Timestamp(v) if dialect == Dialect::Mssql => {
            format!("CAST('{}' AS DATETIME2)", mssql_timestamp(v))
        }
        Value::Time(v) if dialect == Dialect::Mssql => format!("CAST('{}' AS TIME)", mssql_time(v)),
        Value::Date(_) | Value::Timestamp(_) | Value::Time(_) => {
            format!("'{}'", value)
        }
        Value::Json(v) => string_literal(dialect, &v.to_string()),
    };
    Ok(literal)
}

fn float_token(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_negative() {
        "-Infinity"
    } else {
        "Infinity"
    }
}

fn non_finite_literal(dialect: Dialect, token: &str, pg_type: &str) -> Result<String, String> {
    match dialect {
        Dialect::Postgres => Ok(format!("'{}'::{}", token, pg_type)),
        other => Err(format!("{} has no {} representation", token, other)),
    }
}

// DATETIME2 and TIME keep at most 7 fractional digits.
fn mssql_timestamp(value: &NaiveDateTime) -> String {
    format!("{}.{:07}", value.format("%Y-%m-%d %H:%M:%S"), value.nanosecond() % 1_000_000_000 / 100)
}

fn mssql_time(value: &NaiveTime) -> String {
    format!("{}.{:07}", value.format("%H:%M:%S"), value.nanosecond() % 1_000_000_000 / 100)
}

pub fn sql_type_name(dialect: Dialect, data_type: DataType) -> &'static str {
    match (dialect, data_type) {
        (_, DataType::Integer) => "BIGINT",
        (Dialect::Postgres, DataType::Float) => "DOUBLE PRECISION",
        (Dialect::MySql, DataType::Float) => "DOUBLE",
        (Dialect::Mssql, DataType::Float) => "FLOAT",
        (Dialect::Postgres, DataType::Numeric) => "NUMERIC",
        (Dialect::MySql, DataType::Numeric) => "DECIMAL(65,30)",
        (Dialect::Mssql, DataType::Numeric) => "DECIMAL(38,10)",
        (Dialect::Mssql, DataType::Boolean) => "BIT",
        (_, DataType::Boolean) => "BOOLEAN",
        (Dialect::Mssql, DataType::Text) => "NVARCHAR(MAX)",
        (_, DataType::Text) => "TEXT",
        (Dialect::Postgres, DataType::Binary) => "BYTEA",
        (Dialect::MySql, DataType::Binary) => "LONGBLOB",
        (Dialect::Mssql, DataType::Binary) => "VARBINARY(MAX)",
        (_, DataType::Date) => "DATE",
        (Dialect::Postgres, DataType::Timestamp) => "TIMESTAMP",
        (Dialect::MySql, DataType::Timestamp) => "DATETIME(6)",
        (Dialect::Mssql, DataType::Timestamp) => "DATETIME2",
        (Dialect::MySql, DataType::Time) => "TIME(6)",
        (_, DataType::Time) => "TIME",
        (Dialect::Postgres, DataType::Json) => "JSONB",
        (Dialect::MySql, DataType::Json) => "JSON",
        (Dialect::Mssql, DataType::Json) => "NVARCHAR(MAX)",
    }
}

pub fn build_create_table(dialect: Dialect, table: &str, schema: &[(String, DataType)]) -> String {
    let columns = schema
        .iter()
        .map(|(name, data_type)| {
            format!(
                "{} {}",
                quote_identifier(dialect, name),
                sql_type_name(dialect, *data_type)
            )
        })
        .collect::<Vec<String>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", qualified_table_name(dialect, table), columns)
}

pub fn build_drop_table(dialect: Dialect, table: &str) -> String {
    format!("DROP TABLE {}", qualified_table_name(dialect, table))
}

fn current_schema_expr(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "current_schema()",
        Dialect::MySql => "DATABASE()",
        Dialect::Mssql => "SCHEMA_NAME()",
    }
}

fn schema_filter(dialect: Dialect, table: &str) -> (String, String) {
    let (schema, name) = split_table_name(table);
    let schema_expr = schema
        .map(|s| format!("'{}'", escape_sql_string(dialect, s)))
        .unwrap_or_else(|| current_schema_expr(dialect).to_string());
    (schema_expr, format!("'{}'", escape_sql_string(dialect, name)))
}

/// Single-row, single-column query counting tables named `table`.
pub fn build_table_exists_query(dialect: Dialect, table: &str) -> String {
    let (schema_expr, name) = schema_filter(dialect, table);
    format!(
        "SELECT COUNT(*) AS table_count FROM information_schema.tables \
         WHERE table_schema = {} AND table_name = {}",
        schema_expr, name
    )
}

/// Catalog query listing `(column_name, data_type)` of a postgres table in
/// ordinal order.
pub fn build_postgres_column_types_query(table: &str) -> String {
    let (schema_expr, name) = schema_filter(Dialect::Postgres, table);
    format!(
        "SELECT column_name::text AS column_name, data_type::text AS data_type \
         FROM information_schema.columns \
         WHERE table_schema = {} AND table_name = {} \
         ORDER BY ordinal_position",
        schema_expr, name
    )
}

/// Renders `rows` of `data` as multi-row INSERT statements of at most
/// `rows_per_statement` rows each, preserving row order. Fails on the first
/// value that has no literal in `dialect`.
pub fn build_insert_statements(
    dialect: Dialect,
    table: &str,
    data: &TabularResult,
    rows: Range<usize>,
    rows_per_statement: usize,
) -> Result<Vec<String>, String> {
    if data.columns().is_empty() || rows.is_empty() {
        return Ok(Vec::new());
    }

    let qualified_table = qualified_table_name(dialect, table);
    let quoted_columns = data
        .columns()
        .iter()
        .map(|col| quote_identifier(dialect, col.name()))
        .collect::<Vec<String>>()
        .join(", ");

    let first_row = rows.start;
    let per_statement = rows_per_statement.max(1);
    data.rows(rows)
        .chunks(per_statement)
        .enumerate()
        .map(|(batch_index, batch)| -> Result<String, String> {
            let tuples = batch
                .iter()
                .enumerate()
                .map(|(offset, row)| -> Result<String, String> {
                    let values = row
                        .iter()
                        .zip(data.columns())
                        .map(|(value, column)| {
                            value_to_sql_literal(dialect, value).map_err(|reason| {
                                format!(
                                    "row {}, column '{}': {}",
                                    first_row + batch_index * per_statement + offset + 1,
                                    column.name(),
                                    reason
                                )
                            })
                        })
                        .collect::<Result<Vec<String>, String>>()?
                        .join(", ");
                    Ok(format!("({})", values))
                })
                .collect::<Result<Vec<String>, String>>()?
                .join(", ");
            Ok(format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified_table, quoted_columns, tuples
            ))
        })
        .collect()
}
