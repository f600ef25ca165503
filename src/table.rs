// =====================================================
// IN-MEMORY TABULAR RESULT
// Ordered named columns, each a homogeneous nullable sequence
// =====================================================

use crate::db_types::DataType;
use crate::error::Error;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

// --- Cell Value ---
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    /// Decimal text, e.g. `"12.50"`, or one of `NaN`, `Infinity`,
    /// `-Infinity`. [`Column::new`] rejects anything else.
    Numeric(String),
    Boolean(bool),
    Text(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
    Json(serde_json::Value),
}

impl Value {
    /// Semantic type of the value, `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::Numeric(_) => Some(DataType::Numeric),
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Text(_) => Some(DataType::Text),
            Value::Binary(_) => Some(DataType::Binary),
            Value::Date(_) => Some(DataType::Date),
            Value::Timestamp(_) => Some(DataType::Timestamp),
            Value::Time(_) => Some(DataType::Time),
            Value::Json(_) => Some(DataType::Json),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(v) => serde_json::json!(v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(v) => serde_json::json!(v),
            Value::Json(v) => v.clone(),
            Value::Binary(bytes) => serde_json::json!(format!("0x{}", hex::encode(bytes))),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Numeric(v) | Value::Text(v) => f.write_str(v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Binary(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

// --- Decimal Text ---

/// Decimal text normalized to `[-]digits[.digits]`; `None` unless `text` is a
/// plain decimal number.
pub(crate) fn canonical_decimal(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction) {
        return None;
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    if fraction.is_empty() {
        Some(format!("{}{}", sign, whole))
    } else {
        Some(format!("{}{}.{}", sign, whole, fraction))
    }
}

/// Non-finite numeric spellings postgres reads back from `numeric` columns.
pub(crate) fn special_numeric(text: &str) -> Option<&'static str> {
    match text.trim().to_ascii_lowercase().as_str() {
        "nan" => Some("NaN"),
        "infinity" | "+infinity" | "inf" | "+inf" => Some("Infinity"),
        "-infinity" | "-inf" => Some("-Infinity"),
        _ => None,
    }
}

fn is_numeric_text(text: &str) -> bool {
    canonical_decimal(text).is_some() || special_numeric(text).is_some()
}

// --- Column ---
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    data_type: DataType,
    values: Vec<Value>,
}

impl Column {
    /// Builds a column, rejecting any non-null value whose type differs from
    /// `data_type` and numeric cells that are not decimal text.
    pub fn new(name: impl Into<String>, data_type: DataType, values: Vec<Value>) -> Result<Self, Error> {
        let name = name.into();
        if let Some((row, value)) = values
            .iter()
            .enumerate()
            .find(|(_, value)| value.data_type().is_some_and(|found| found != data_type))
        {
            return Err(Error::InvalidInput(format!(
                "column '{}' is typed {} but row {} holds a {} value",
                name,
                data_type,
                row + 1,
                value.data_type().map(|t| t.as_str()).unwrap_or("null"),
            )));
        }

        if let Some((row, text)) = values.iter().enumerate().find_map(|(row, value)| match value {
            Value::Numeric(text) if !is_numeric_text(text) => Some((row, text)),
            _ => None,
        }) {
            return Err(Error::InvalidInput(format!(
                "column '{}' row {} holds '{}', which is not decimal text",
                name,
                row + 1,
                text
            )));
        }

        Ok(Self {
            name,
            data_type,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_parts(self) -> (String, DataType, Vec<Value>) {
        (self.name, self.data_type, self.values)
    }
}

// --- Tabular Result ---
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TabularResult {
    columns: Vec<Column>,
}

impl TabularResult {
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate column name '{}'",
                    column.name()
                )));
            }
        }

        if let Some(first) = columns.first() {
            if let Some(column) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(Error::InvalidInput(format!(
                    "column '{}' has {} rows but column '{}' has {}",
                    column.name(),
                    column.len(),
                    first.name(),
                    first.len()
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Builds a table from row-major data, validating the row widths.
    pub fn from_rows(schema: Vec<(String, DataType)>, rows: Vec<Vec<Value>>) -> Result<Self, Error> {
        let mut buffers: Vec<Vec<Value>> = schema.iter().map(|_| Vec::with_capacity(rows.len())).collect();
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != schema.len() {
                return Err(Error::InvalidInput(format!(
                    "row {} has {} values but the table has {} columns",
                    index + 1,
                    row.len(),
                    schema.len()
                )));
            }
            for (buffer, value) in buffers.iter_mut().zip(row) {
                buffer.push(value);
            }
        }

        let columns = schema
            .into_iter()
            .zip(buffers)
            .map(|((name, data_type), values)| Column::new(name, data_type, values))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_columns(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn schema(&self) -> Vec<(String, DataType)> {
        self.columns
            .iter()
            .map(|c| (c.name().to_string(), c.data_type()))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values()[index]).collect())
    }

    /// Row-major view over `range`, clamped to the table length.
    pub fn rows(&self, range: Range<usize>) -> Vec<Vec<&Value>> {
        let end = range.end.min(self.row_count());
        (range.start.min(end)..end)
            .map(|index| self.columns.iter().map(|c| &c.values()[index]).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests;
