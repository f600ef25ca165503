use super::*;
use chrono::NaiveDate;

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Integer).collect()
}

#[test]
fn test_column_rejects_mixed_types() {
    let err = Column::new(
        "id",
        DataType::Integer,
        vec![Value::Integer(1), Value::Null, Value::Text("3".into())],
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("column 'id'"));
    assert!(message.contains("row 3"));
}

#[test]
fn test_column_allows_nulls() {
    let column = Column::new("note", DataType::Text, vec![Value::Null, Value::Null]).unwrap();
    assert_eq!(column.len(), 2);
    assert_eq!(column.data_type(), DataType::Text);
}

#[test]
fn test_from_columns_validates_shape() {
    let a = Column::new("a", DataType::Integer, ints(&[1, 2])).unwrap();
    let b = Column::new("b", DataType::Integer, ints(&[1])).unwrap();
    assert!(matches!(
        TabularResult::from_columns(vec![a.clone(), b]),
        Err(Error::InvalidInput(_))
    ));

    let duplicate = Column::new("a", DataType::Integer, ints(&[3, 4])).unwrap();
    assert!(matches!(
        TabularResult::from_columns(vec![a, duplicate]),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_from_rows_preserves_order() {
    let table = TabularResult::from_rows(
        vec![("id".into(), DataType::Integer), ("name".into(), DataType::Text)],
        vec![
            vec![Value::Integer(2), Value::Text("b".into())],
            vec![Value::Integer(1), Value::Null],
        ],
    )
    .unwrap();

    assert_eq!(table.column_names(), vec!["id", "name"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.row(0), Some(vec![&Value::Integer(2), &Value::Text("b".into())]));
    assert_eq!(table.row(2), None);
    assert_eq!(table.column("name").map(Column::len), Some(2));
}

#[test]
fn test_from_rows_rejects_ragged_rows() {
    let err = TabularResult::from_rows(
        vec![("id".into(), DataType::Integer)],
        vec![vec![Value::Integer(1)], vec![Value::Integer(2), Value::Integer(3)]],
    )
    .unwrap_err();
    assert!(err.to_string().contains("row 2"));
}

#[test]
fn test_rows_clamps_range() {
    let table = TabularResult::from_columns(vec![
        Column::new("n", DataType::Integer, ints(&[1, 2, 3, 4])).unwrap(),
    ])
    .unwrap();

    assert_eq!(table.rows(2..10).len(), 2);
    assert_eq!(table.rows(5..9).len(), 0);
    assert_eq!(table.rows(1..3), vec![vec![&Value::Integer(2)], vec![&Value::Integer(3)]]);
}

#[test]
fn test_empty_table() {
    let table = TabularResult::default();
    assert!(table.is_empty());
    assert_eq!(table.row_count(), 0);
    assert!(table.schema().is_empty());
}

#[test]
fn test_value_display_and_json() {
    let date = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
    let timestamp = date.and_hms_milli_opt(8, 30, 0, 250).unwrap();

    assert_eq!(Value::Date(date).to_string(), "2023-07-01");
    assert_eq!(Value::Timestamp(timestamp).to_string(), "2023-07-01 08:30:00.250");
    assert_eq!(Value::Binary(vec![1, 255]).to_string(), "0x01ff");
    assert_eq!(Value::Null.to_string(), "NULL");

    assert_eq!(Value::Integer(7).to_json(), serde_json::json!(7));
    assert_eq!(Value::Float(f64::INFINITY).to_json(), serde_json::Value::Null);
    assert_eq!(Value::Numeric("1.10".into()).to_json(), serde_json::json!("1.10"));
    assert_eq!(Value::Binary(vec![0xab]).to_json(), serde_json::json!("0xab"));
    assert_eq!(Value::Null.data_type(), None);
    assert_eq!(Value::Boolean(true).data_type(), Some(DataType::Boolean));
}

#[test]
fn test_canonical_decimal() {
    assert_eq!(canonical_decimal(" +.50 "), Some("0.50".to_string()));
    assert_eq!(canonical_decimal("-12"), Some("-12".to_string()));
    assert_eq!(canonical_decimal("1e5"), None);
    assert_eq!(canonical_decimal("."), None);
    assert_eq!(special_numeric("nan"), Some("NaN"));
    assert_eq!(special_numeric("-Infinity"), Some("-Infinity"));
    assert_eq!(special_numeric("12"), None);
}

#[test]
fn test_column_rejects_non_decimal_numeric_text() {
    let err = Column::new(
        "n",
        DataType::Numeric,
        vec![Value::Numeric("1.5".into()), Value::Numeric("0); DROP TABLE t; --".into())],
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("row 2")), "{}", err);

    let column = Column::new(
        "n",
        DataType::Numeric,
        vec![Value::Numeric("NaN".into()), Value::Null, Value::Numeric("-3.25".into())],
    )
    .unwrap();
    assert_eq!(column.len(), 3);
}
