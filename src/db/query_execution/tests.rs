use super::*;
use crate::db::testing::ScriptedConnection;
use crate::db_types::{DataType, Dialect};
use crate::table::Value;

fn fixture() -> TabularResult {
    TabularResult::from_rows(
        vec![("id".to_string(), DataType::Integer), ("name".to_string(), DataType::Text)],
        vec![
            vec![Value::Integer(1), Value::Text("ada".into())],
            vec![Value::Integer(2), Value::Text("grace".into())],
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn test_read_table_returns_result() {
    let mut conn = ScriptedConnection::new(Dialect::Postgres).returning(Ok(fixture()));

    let table = read_table(&mut conn, "SELECT id, name FROM people ORDER BY id").await.unwrap();
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_names(), vec!["id", "name"]);
    assert_eq!(conn.executed, vec!["SELECT id, name FROM people ORDER BY id".to_string()]);
}

#[tokio::test]
async fn test_read_table_is_repeatable() {
    let mut conn = ScriptedConnection::new(Dialect::MySql)
        .returning(Ok(fixture()))
        .returning(Ok(fixture()));

    let first = read_table(&mut conn, "SELECT * FROM people").await.unwrap();
    let second = read_table(&mut conn, "SELECT * FROM people").await.unwrap();
    assert_eq!(first.row_count(), second.row_count());
    assert_eq!(first.column_names(), second.column_names());
}

#[tokio::test]
async fn test_read_table_wraps_driver_error_with_query() {
    let mut conn = ScriptedConnection::new(Dialect::Mssql)
        .returning(Err("Invalid object name 'nope'".into()));

    let err = read_table(&mut conn, "SELECT * FROM nope").await.unwrap_err();
    match err {
        Error::Query { dialect, query, source } => {
            assert_eq!(dialect, Dialect::Mssql);
            assert_eq!(query, "SELECT * FROM nope");
            assert_eq!(source.to_string(), "Invalid object name 'nope'");
        }
        other => panic!("expected query error, got {:?}", other),
    }
    assert_eq!(conn.executed.len(), 1);
}

#[tokio::test]
async fn test_read_table_rejects_blank_query() {
    let mut conn = ScriptedConnection::new(Dialect::Postgres);
    assert!(matches!(read_table(&mut conn, "  ").await, Err(Error::InvalidInput(_))));
    assert!(conn.executed.is_empty());
}
