// =====================================================
// MSSQL SPECIFIC DATABASE OPERATIONS (via Tiberius)
// =====================================================

use crate::db_types::{ConnectionConfig, DataType, Endpoint};
use crate::table::{TabularResult, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, Client, ColumnType, Config, QueryItem, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub type MssqlClient = Client<Compat<TcpStream>>;

// --- Connection ---

pub async fn connect(config: &ConnectionConfig, endpoint: &Endpoint) -> Result<MssqlClient, tiberius::error::Error> {
    let mut tiberius_config = Config::new();
    tiberius_config.host(&endpoint.host);
    tiberius_config.port(endpoint.port);
    tiberius_config.authentication(AuthMethod::sql_server(
        &config.user,
        config.password.expose(),
    ));
    tiberius_config.database(&config.database);
    tiberius_config.trust_cert();

    let tcp = TcpStream::connect(tiberius_config.get_addr()).await?;
    tcp.set_nodelay(true)?;

    let mut client = Client::connect(tiberius_config, tcp.compat_write()).await?;

    client.simple_query("SELECT 1").await?.into_results().await?;

    Ok(client)
}

pub async fn close(client: MssqlClient) -> Result<(), tiberius::error::Error> {
    client.close().await
}

// --- Query Execution ---

/// Materializes the first result set of `query` that produced rows. Column
/// metadata arrives ahead of the rows, so an empty result keeps its columns.
pub async fn fetch(client: &mut MssqlClient, query: &str) -> Result<TabularResult, tiberius::error::Error> {
    let mut stream = client.query(query, &[]).await?;

    let mut schema: Vec<(String, DataType)> = Vec::new();
    let mut rows: Vec<Vec<Value>> = Vec::new();
    let mut finished_first_set = false;

    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                if !rows.is_empty() {
                    finished_first_set = true;
                }
                if !finished_first_set {
                    schema = meta
                        .columns()
                        .iter()
                        .map(|c| (c.name().to_string(), column_data_type(c.column_type())))
                        .collect();
                }
            }
            QueryItem::Row(row) => {
                if finished_first_set {
                    continue;
                }
                let mut values = Vec::with_capacity(schema.len());
                for (index, (_, data_type)) in schema.iter().enumerate() {
                    values.push(decode_value(&row, index, *data_type)?);
                }
                rows.push(values);
            }
        }
    }

    TabularResult::from_rows(schema, rows)
        .map_err(|e| tiberius::error::Error::Conversion(e.to_string().into()))
}

pub(crate) fn column_data_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Int1 | ColumnType::Int2 | ColumnType::Int4 | ColumnType::Int8 | ColumnType::Intn => {
            DataType::Integer
        }
        ColumnType::Float4 | ColumnType::Float8 | ColumnType::Floatn => DataType::Float,
        ColumnType::Decimaln | ColumnType::Numericn | ColumnType::Money | ColumnType::Money4 => {
            DataType::Numeric
        }
        ColumnType::Bit | ColumnType::Bitn => DataType::Boolean,
        ColumnType::Daten => DataType::Date,
        ColumnType::Timen => DataType::Time,
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2
        | ColumnType::DatetimeOffsetn => DataType::Timestamp,
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => DataType::Binary,
        _ => DataType::Text,
    }
}

fn decode_value(row: &Row, index: usize, data_type: DataType) -> Result<Value, tiberius::error::Error> {
    let value = match data_type {
        DataType::Integer => row
            .try_get::<i64, _>(index)
            .or_else(|_| row.try_get::<i32, _>(index).map(|v| v.map(i64::from)))
            .or_else(|_| row.try_get::<i16, _>(index).map(|v| v.map(i64::from)))
            .or_else(|_| row.try_get::<u8, _>(index).map(|v| v.map(i64::from)))?
            .map(Value::Integer),
        DataType::Float => row
            .try_get::<f64, _>(index)
            .or_else(|_| row.try_get::<f32, _>(index).map(|v| v.map(f64::from)))?
            .map(Value::Float),
        DataType::Numeric => row
            .try_get::<Numeric, _>(index)
            .map(|v| v.map(|n| n.to_string()))
            .or_else(|_| row.try_get::<f64, _>(index).map(|v| v.map(|n| n.to_string())))?
            .map(Value::Numeric),
        DataType::Boolean => row.try_get::<bool, _>(index)?.map(Value::Boolean),
        DataType::Text => row
            .try_get::<&str, _>(index)
            .map(|v| v.map(str::to_string))
            .or_else(|_| row.try_get::<tiberius::Uuid, _>(index).map(|v| v.map(|u| u.to_string())))?
            .map(Value::Text),
        DataType::Binary => row.try_get::<&[u8], _>(index)?.map(|v| Value::Binary(v.to_vec())),
        DataType::Date => row.try_get::<NaiveDate, _>(index)?.map(Value::Date),
        DataType::Timestamp => row
            .try_get::<NaiveDateTime, _>(index)
            .or_else(|_| {
                row.try_get::<DateTime<FixedOffset>, _>(index)
                    .map(|v| v.map(|dt| dt.naive_utc()))
            })?
            .map(Value::Timestamp),
        DataType::Time => row.try_get::<NaiveTime, _>(index)?.map(Value::Time),
        DataType::Json => match row.try_get::<&str, _>(index)? {
            Some(text) => Some(Value::Json(serde_json::from_str(text).map_err(|e| {
                tiberius::error::Error::Conversion(format!("invalid JSON in column {}: {}", index, e).into())
            })?)),
            None => None,
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

pub async fn execute(client: &mut MssqlClient, statement: &str) -> Result<u64, tiberius::error::Error> {
    Ok(client.execute(statement, &[]).await?.total())
}

/// Runs `statements` in one transaction; a failing statement rolls back the
/// whole batch before its error is returned.
pub async fn execute_batch(client: &mut MssqlClient, statements: &[String]) -> Result<u64, tiberius::error::Error> {
    client
        .simple_query("BEGIN TRANSACTION")
        .await?
        .into_results()
        .await?;

    let mut affected = 0;
    for statement in statements {
        match client.execute(statement.as_str(), &[]).await {
            Ok(result) => affected += result.total(),
            Err(e) => {
                if let Err(rollback_error) = rollback(client).await {
                    log::warn!("Rollback after failed MSSQL batch also failed: {}", rollback_error);
                }
                return Err(e);
            }
        }
    }

    client
        .simple_query("COMMIT TRANSACTION")
        .await?
        .into_results()
        .await?;
    Ok(affected)
}

async fn rollback(client: &mut MssqlClient) -> Result<(), tiberius::error::Error> {
    client
        .simple_query("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")
        .await?
        .into_results()
        .await?;
    Ok(())
}
