// =====================================================
// PostgreSQL SPECIFIC DATABASE OPERATIONS
// =====================================================

use crate::db_types::{ConnectionConfig, DataType, Endpoint};
use crate::table::{TabularResult, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::StreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, ConnectOptions, Connection, Either, Row, TypeInfo, ValueRef};

// --- Connection ---

pub async fn connect(config: &ConnectionConfig, endpoint: &Endpoint) -> Result<PgConnection, sqlx::Error> {
    let mut options = PgConnectOptions::new()
        .host(&endpoint.host)
        .port(endpoint.port)
        .username(&config.user)
        .password(config.password.expose())
        .database(&config.database);

    options = if config.verbose {
        options.log_statements(log::LevelFilter::Debug)
    } else {
        options.disable_statement_logging()
    };

    let mut conn = options.connect().await?;

    // Handshake is only trusted once a round trip succeeds.
    sqlx::query("SELECT 1").fetch_one(&mut conn).await?;

    Ok(conn)
}

pub async fn close(conn: PgConnection) -> Result<(), sqlx::Error> {
    conn.close().await
}

// --- Query Execution ---

/// Runs `query` over the simple protocol and materializes the first result
/// set that produced rows. Values arrive in text format, which lets
/// `numeric` decode losslessly into its decimal text.
pub async fn fetch(conn: &mut PgConnection, query: &str) -> Result<TabularResult, sqlx::Error> {
    let mut stream = sqlx::raw_sql(query).fetch_many(&mut *conn);

    let mut schema: Vec<(String, DataType, bool)> = Vec::new();
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
                        .map(|c| {
                            let type_name = c.type_info().name();
                            let tz_aware = type_name.eq_ignore_ascii_case("TIMESTAMPTZ");
                            (c.name().to_string(), column_data_type(type_name), tz_aware)
                        })
                        .collect();
                }

                let mut values = Vec::with_capacity(schema.len());
                for (index, (_, data_type, tz_aware)) in schema.iter().enumerate() {
                    values.push(decode_value(&row, index, *data_type, *tz_aware)?);
                }
                rows.push(values);
            }
        }
    }

    let schema = schema
        .into_iter()
        .map(|(name, data_type, _)| (name, data_type))
        .collect();
    TabularResult::from_rows(schema, rows).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Semantic type used to decode a result column. Types whose text form does
/// not parse as their semantic counterpart (`money` carries a currency
/// symbol, `timetz` an offset) are read as text.
pub(crate) fn column_data_type(type_name: &str) -> DataType {
    match type_name.to_ascii_uppercase().as_str() {
        "MONEY" | "TIMETZ" => DataType::Text,
        _ => DataType::from_native(type_name).unwrap_or(DataType::Text),
    }
}

fn decode_value(row: &PgRow, index: usize, data_type: DataType, tz_aware: bool) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match data_type {
        DataType::Integer => row
            .try_get_unchecked::<i64, _>(index)
            .or_else(|_| row.try_get_unchecked::<i32, _>(index).map(i64::from))
            .or_else(|_| row.try_get_unchecked::<i16, _>(index).map(i64::from))
            .map(Value::Integer)?,
        DataType::Float => row
            .try_get_unchecked::<f64, _>(index)
            .or_else(|_| row.try_get_unchecked::<f32, _>(index).map(f64::from))
            .map(Value::Float)?,
        DataType::Numeric => Value::Numeric(row.try_get_unchecked::<String, _>(index)?),
        DataType::Boolean => Value::Boolean(row.try_get_unchecked::<bool, _>(index)?),
        DataType::Text => Value::Text(row.try_get_unchecked::<String, _>(index)?),
        DataType::Binary => Value::Binary(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        DataType::Date => Value::Date(row.try_get_unchecked::<NaiveDate, _>(index)?),
        DataType::Timestamp if tz_aware => {
            Value::Timestamp(row.try_get_unchecked::<DateTime<Utc>, _>(index)?.naive_utc())
        }
        DataType::Timestamp => Value::Timestamp(row.try_get_unchecked::<NaiveDateTime, _>(index)?),
        DataType::Time => Value::Time(row.try_get_unchecked::<NaiveTime, _>(index)?),
        DataType::Json => Value::Json(row.try_get_unchecked::<serde_json::Value, _>(index)?),
    };
    Ok(value)
}

pub async fn execute(conn: &mut PgConnection, statement: &str) -> Result<u64, sqlx::Error> {
    Ok(sqlx::Executor::execute(&mut *conn, statement).await?.rows_affected())
}

/// Runs `statements` in one transaction; nothing is kept if any fails.
pub async fn execute_batch(conn: &mut PgConnection, statements: &[String]) -> Result<u64, sqlx::Error> {
    let mut tx = conn.begin().await?;
    let mut affected = 0;
    for statement in statements {
        affected += sqlx::Executor::execute(&mut *tx, statement.as_str()).await?.rows_affected();
    }
    tx.commit().await?;
    Ok(affected)
}
