use super::*;

#[test]
fn test_column_data_type_from_sqlx_type_names() {
    assert_eq!(column_data_type("BIGINT"), DataType::Integer);
    assert_eq!(column_data_type("INT UNSIGNED"), DataType::Integer);
    assert_eq!(column_data_type("DOUBLE"), DataType::Float);
    assert_eq!(column_data_type("DECIMAL"), DataType::Numeric);
    assert_eq!(column_data_type("BOOLEAN"), DataType::Boolean);
    assert_eq!(column_data_type("VARCHAR"), DataType::Text);
    assert_eq!(column_data_type("BLOB"), DataType::Binary);
    assert_eq!(column_data_type("DATETIME"), DataType::Timestamp);
    assert_eq!(column_data_type("JSON"), DataType::Json);
}

#[test]
fn test_bit_columns_decode_as_bytes() {
    assert_eq!(column_data_type("BIT"), DataType::Binary);
    assert_eq!(column_data_type("GEOMETRY"), DataType::Text);
    assert_eq!(column_data_type("NULL"), DataType::Text);
}

#[test]
fn test_unsigned_bigint_reads_as_decimal_text() {
    assert_eq!(column_data_type("BIGINT UNSIGNED"), DataType::Numeric);
    assert_eq!(column_data_type("bigint unsigned"), DataType::Numeric);
    assert_eq!(column_data_type("INT UNSIGNED"), DataType::Integer);
}
