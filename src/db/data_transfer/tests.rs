use super::*;
use crate::db::testing::{catalog_result, count_result, MockConnection, ScriptedConnection};
use crate::db_types::{DataType, Dialect};
use crate::table::{Column, Value};

fn numbered(rows: i64) -> TabularResult {
    TabularResult::from_columns(vec![
        Column::new("id", DataType::Integer, (1..=rows).map(Value::Integer).collect()).unwrap(),
        Column::new(
            "label",
            DataType::Text,
            (1..=rows).map(|n| Value::Text(format!("row {}", n))).collect(),
        )
        .unwrap(),
    ])
    .unwrap()
}

fn ids(rows: &[Vec<Value>]) -> Vec<i64> {
    rows.iter()
        .map(|row| match row[0] {
            Value::Integer(n) => n,
            ref other => panic!("unexpected id {:?}", other),
        })
        .collect()
}

#[test]
fn test_chunk_ranges() {
    assert_eq!(chunk_ranges(7, 3), vec![0..3, 3..6, 6..7]);
    assert_eq!(chunk_ranges(6, 3), vec![0..3, 3..6]);
    assert_eq!(chunk_ranges(2, 10_000), vec![0..2]);
    assert!(chunk_ranges(0, 3).is_empty());
}

#[tokio::test]
async fn test_write_splits_into_ordered_chunks() {
    let mut conn = MockConnection::new(Dialect::Postgres);
    let options = WriteOptions::new(ConflictPolicy::Fail).chunk_size(3);

    let written = write_table(&mut conn, numbered(7), "events", &options).await.unwrap();

    assert_eq!(written, 7);
    assert_eq!(conn.insert_ranges, vec![0..3, 3..6, 6..7]);
    assert_eq!(ids(&conn.rows_of("events")), vec![1, 2, 3, 4, 5, 6, 7]);
}

#[tokio::test]
async fn test_failed_second_chunk_reports_range_and_committed_rows() {
    let mut conn = MockConnection::new(Dialect::Postgres).failing_insert_call(2);
    let options = WriteOptions::new(ConflictPolicy::Fail).chunk_size(3);

    let err = write_table(&mut conn, numbered(7), "events", &options).await.unwrap_err();

    match &err {
        Error::Write { table, first_row, last_row, rows_written, .. } => {
            assert_eq!(table, "events");
            assert_eq!((*first_row, *last_row), (4, 6));
            assert_eq!(*rows_written, 3);
        }
        other => panic!("expected write error, got {:?}", other),
    }
    assert_eq!(err.rows_written(), 3);
    // No chunk after the failing one is attempted.
    assert_eq!(conn.insert_calls, 2);
    assert_eq!(ids(&conn.rows_of("events")), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_replace_twice_keeps_only_second_run() {
    let mut conn = MockConnection::new(Dialect::MySql);
    let options = WriteOptions::new(ConflictPolicy::Replace).chunk_size(2);

    write_table(&mut conn, numbered(5), "events", &options).await.unwrap();
    let second = TabularResult::from_columns(vec![
        Column::new("id", DataType::Integer, vec![Value::Integer(10), Value::Integer(11)]).unwrap(),
        Column::new("label", DataType::Text, vec![Value::Null, Value::Text("b".into())]).unwrap(),
    ])
    .unwrap();
    let written = write_table(&mut conn, second, "events", &options).await.unwrap();

    assert_eq!(written, 2);
    assert_eq!(conn.drops, 1);
    assert_eq!(ids(&conn.rows_of("events")), vec![10, 11]);
}

#[tokio::test]
async fn test_append_keeps_existing_rows() {
    let mut conn = MockConnection::new(Dialect::Mssql).with_table(
        "events",
        vec![("id".into(), DataType::Integer), ("label".into(), DataType::Text)],
        vec![vec![Value::Integer(0), Value::Null]],
    );
    let options = WriteOptions::new(ConflictPolicy::Append);

    let written = write_table(&mut conn, numbered(2), "events", &options).await.unwrap();
    assert_eq!(written, 2);
    assert_eq!(ids(&conn.rows_of("events")), vec![0, 1, 2]);
    assert_eq!(conn.drops, 0);
}

#[tokio::test]
async fn test_fail_if_exists() {
    let mut conn = MockConnection::new(Dialect::Postgres).with_table("events", Vec::new(), Vec::new());
    let options = WriteOptions::new(ConflictPolicy::Fail);

    let err = write_table(&mut conn, numbered(2), "events", &options).await.unwrap_err();
    assert!(matches!(err, Error::TableExists(ref name) if name == "events"));
    assert_eq!(conn.insert_calls, 0);
}

#[tokio::test]
async fn test_zero_chunk_size_is_rejected() {
    let mut conn = MockConnection::new(Dialect::Postgres);
    let options = WriteOptions::default().chunk_size(0);

    let err = write_table(&mut conn, numbered(2), "events", &options).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(conn.tables.is_empty());
}

#[tokio::test]
async fn test_empty_tables() {
    let mut conn = MockConnection::new(Dialect::Postgres);
    let options = WriteOptions::default();

    let written = write_table(&mut conn, TabularResult::default(), "events", &options).await.unwrap();
    assert_eq!(written, 0);
    assert!(conn.tables.is_empty());

    let written = write_table(&mut conn, numbered(0), "events", &options).await.unwrap();
    assert_eq!(written, 0);
    assert!(conn.tables.contains_key("events"));
    assert_eq!(conn.insert_calls, 0);
}

#[tokio::test]
async fn test_retrieve_types_casts_before_writing() {
    let mut conn = MockConnection::new(Dialect::Postgres).with_table(
        "events",
        vec![("id".into(), DataType::Numeric), ("label".into(), DataType::Text)],
        Vec::new(),
    );
    conn.push_fetch_result(Ok(catalog_result(&[("id", "numeric"), ("label", "text")])));
    let options = WriteOptions::new(ConflictPolicy::Append).retrieve_types(true);

    write_table(&mut conn, numbered(2), "events", &options).await.unwrap();

    let rows = conn.rows_of("events");
    assert_eq!(rows[0][0], Value::Numeric("1".into()));
    assert_eq!(rows[1][0], Value::Numeric("2".into()));
    assert_eq!(conn.fetched_queries.len(), 1);
}

#[tokio::test]
async fn test_override_wins_over_retrieved_type() {
    let mut conn = MockConnection::new(Dialect::Postgres).with_table("events", Vec::new(), Vec::new());
    conn.push_fetch_result(Ok(catalog_result(&[("id", "numeric"), ("label", "text")])));
    let options = WriteOptions::new(ConflictPolicy::Append)
        .retrieve_types(true)
        .override_type("id", DataType::Text);

    write_table(&mut conn, numbered(1), "events", &options).await.unwrap();
    assert_eq!(conn.rows_of("events")[0][0], Value::Text("1".into()));
}

#[tokio::test]
async fn test_cast_failure_writes_nothing() {
    let mut conn = MockConnection::new(Dialect::Postgres).with_table("events", Vec::new(), Vec::new());
    conn.push_fetch_result(Ok(catalog_result(&[("label", "bytea")])));
    let options = WriteOptions::new(ConflictPolicy::Append).retrieve_types(true);

    let err = write_table(&mut conn, numbered(3), "events", &options).await.unwrap_err();
    assert!(matches!(err, Error::CastType { ref column, .. } if column == "label"));
    assert_eq!(conn.insert_calls, 0);
}

#[tokio::test]
async fn test_retrieve_types_against_missing_table() {
    let mut conn = MockConnection::new(Dialect::Postgres);
    let options = WriteOptions::new(ConflictPolicy::Replace).retrieve_types(true);

    let err = write_table(&mut conn, numbered(1), "ghost", &options).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref table } if table == "ghost"));
    assert!(conn.tables.is_empty());
}

#[tokio::test]
async fn test_retrieve_types_unsupported_dialect() {
    let mut conn = MockConnection::new(Dialect::MySql);
    let options = WriteOptions::new(ConflictPolicy::Replace).retrieve_types(true);

    let err = write_table(&mut conn, numbered(1), "events", &options).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedDialect { dialect: Dialect::MySql, .. }));
}

#[tokio::test]
async fn test_non_finite_float_fails_its_chunk() {
    let table = TabularResult::from_rows(
        vec![("x".to_string(), DataType::Float)],
        vec![
            vec![Value::Float(1.5)],
            vec![Value::Float(2.5)],
            vec![Value::Float(f64::INFINITY)],
        ],
    )
    .unwrap();
    let mut conn = ScriptedConnection::new(Dialect::Mssql).returning(Ok(count_result(1)));
    let options = WriteOptions::new(ConflictPolicy::Append).chunk_size(2);

    let err = write_table(&mut conn, table, "readings", &options).await.unwrap_err();

    match &err {
        Error::Write { first_row, last_row, rows_written, source, .. } => {
            assert_eq!((*first_row, *last_row), (3, 3));
            assert_eq!(*rows_written, 2);
            assert!(source.to_string().contains("Infinity"), "{}", source);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(conn.batches.len(), 1);
    assert!(!conn.batches[0].iter().any(|statement| statement.contains("NULL")));
}

#[tokio::test]
async fn test_preparation_failure_on_empty_table_reports_no_rows() {
    let table = TabularResult::from_rows(vec![("id".to_string(), DataType::Integer)], Vec::new()).unwrap();
    let mut conn = ScriptedConnection::new(Dialect::Postgres).returning(Err("connection reset".into()));
    let options = WriteOptions::new(ConflictPolicy::Replace);

    let err = write_table(&mut conn, table, "t", &options).await.unwrap_err();

    assert_eq!(err.rows_written(), 0);
    assert_eq!(
        err.to_string(),
        "failed writing to 't' before any rows were sent (0 rows already committed): connection reset"
    );
}
