// =====================================================
// MySQL SPECIFIC DATABASE OPERATIONS
// =====================================================

use crate::db_types::{ConnectionConfig, DataType, Endpoint};
use crate::table::{TabularResult, Value};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::StreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Either, Row, TypeInfo, ValueRef};

// --- Connection ---

pub async fn connect(config: &ConnectionConfig, endpoint: &Endpoint) -> Result<MySqlConnection, sqlx::Error> {
    let mut options = MySqlConnectOptions::new()
        .host(&endpoint.host)
        .port(endpoint.port)
        .username(&config.user)
        .database(&config.database);

    if !config.password.expose().is_empty() {
        options = options.password(config.password.expose());
    }

    options = if config.verbose {
        options.log_statements(log::LevelFilter::Debug)
    } else {
        options.disable_statement_logging()
    };

    let mut conn = options.connect().await?;

    sqlx::query("SELECT 1").fetch_one(&mut conn).await?;

    Ok(conn)
}

pub async fn close(conn: MySqlConnection) -> Result<(), sqlx::Error> {
    conn.close().await
}

// --- Query Execution ---

/// Runs `query` over the text protocol and materializes the first result set
/// that produced rows.
pub async fn fetch(conn: &mut MySqlConnection, query: &str) -> Result<TabularResult, sqlx::Error> {
    let mut stream = sqlx::raw_sql(query).fetch_many(&mut *conn);

    let mut schema: Vec<(String, DataType)> = Vec::new();
    let mut rows: Vec<Vec<Value>> = Vec::new();
    let mut finished_first_set = false;

    while let Some(item) = stream.next().await {
        match item? {
            Either::Left(_done) => {
                if !rows.is_empty() {
                    finished_first_set = true;
                }
            }
            Either::Right(row) => {
                if finished_first_set {
                    continue;
                }
                if schema.is_empty() {
                    schema = row
                        .columns()
                        .iter()
                        .map(|c| (c.name().to_string(), column_data_type(c.type_info().name())))
                        .collect();
                }

                let mut values = Vec::with_capacity(schema.len());
                for (index, (_, data_type)) in schema.iter().enumerate() {
                    values.push(decode_value(&row, index, *data_type)?);
                }
                rows.push(values);
            }
        }
    }

    TabularResult::from_rows(schema, rows).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Semantic type used to decode a result column. `BIT` arrives as a packed
/// byte string, and `BOOLEAN` is how sqlx reports `TINYINT(1)`. Unsigned
/// `BIGINT` values can exceed `i64::MAX`, so they are kept as decimal text.
pub(crate) fn column_data_type(type_name: &str) -> DataType {
    match type_name.to_ascii_uppercase().as_str() {
        "BIT" => DataType::Binary,
        "BIGINT UNSIGNED" => DataType::Numeric,
        "BOOLEAN" => DataType::Boolean,
        _ => DataType::from_native(type_name).unwrap_or(DataType::Text),
    }
}

fn decode_value(row: &MySqlRow, index: usize, data_type: DataType) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match data_type {
        DataType::Integer => row
            .try_get_unchecked::<i64, _>(index)
            .or_else(|_| row.try_get_unchecked::<i32, _>(index).map(i64::from))
            .or_else(|_| row.try_get_unchecked::<u32, _>(index).map(i64::from))
            .map(Value::Integer)?,
        DataType::Float => row
            .try_get_unchecked::<f64, _>(index)
            .or_else(|_| row.try_get_unchecked::<f32, _>(index).map(f64::from))
            .map(Value::Float)?,
        DataType::Numeric => Value::Numeric(
            row.try_get_unchecked::<String, _>(index)
                .or_else(|_| row.try_get_unchecked::<u64, _>(index).map(|v| v.to_string()))?,
        ),
        DataType::Boolean => Value::Boolean(row.try_get_unchecked::<bool, _>(index)?),
        DataType::Text => match row.try_get_unchecked::<String, _>(index) {
            Ok(text) => Value::Text(text),
            Err(_) => {
                let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                Value::Text(String::from_utf8_lossy(&bytes).to_string())
            }
        },
        DataType::Binary => Value::Binary(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        DataType::Date => Value::Date(row.try_get_unchecked::<NaiveDate, _>(index)?),
        DataType::Timestamp => Value::Timestamp(row.try_get_unchecked::<NaiveDateTime, _>(index)?),
        DataType::Time => Value::Time(row.try_get_unchecked::<NaiveTime, _>(index)?),
        DataType::Json => Value::Json(row.try_get_unchecked::<serde_json::Value, _>(index)?),
    };
    Ok(value)
}

pub async fn execute(conn: &mut MySqlConnection, statement: &str) -> Result<u64, sqlx::Error> {
    Ok(sqlx::Executor::execute(&mut *conn, statement).await?.rows_affected())
}

/// Runs `statements` in one transaction. DDL commits implicitly on MySQL, so
/// callers keep schema changes out of the batch.
pub async fn execute_batch(conn: &mut MySqlConnection, statements: &[String]) -> Result<u64, sqlx::Error> {
    let mut tx = conn.begin().await?;
    let mut affected = 0;
    for statement in statements {
        affected += sqlx::Executor::execute(&mut *tx, statement.as_str()).await?.rows_affected();
    }
    tx.commit().await?;
    Ok(affected)
}

#[cfg(test)]
mod tests;
