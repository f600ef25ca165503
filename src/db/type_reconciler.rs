// =====================================================
// TYPE RECONCILIATION MODULE
// Builds and applies per-column casting plans ahead of a write
// =====================================================

use super::metadata::ColumnTypeMap;
use crate::db_types::{DataType, TypeOverrides};
use crate::error::{Error, Result};
use crate::table::{canonical_decimal, Column, TabularResult, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Converts one non-null value; the error string explains the rejection.
pub type Conversion = fn(&Value) -> std::result::Result<Value, String>;

/// Largest magnitude an `i64` keeps exactly as an `f64`.
const MAX_EXACT_FLOAT_INT: i64 = 1 << 53;

// =====================================================
// CONVERSION TABLE
// =====================================================

/// Conversion for the `(from, to)` pair, `None` when the pair is not
/// convertible. Identity pairs are never looked up.
pub fn conversion(from: DataType, to: DataType) -> Option<Conversion> {
    use DataType::*;

    let convert: Conversion = match (from, to) {
        (Integer, Float) => integer_to_float,
        (Integer, Numeric) => integer_to_numeric,
        (Integer, Boolean) => integer_to_boolean,

        (Float, Integer) => float_to_integer,
        (Float, Numeric) => float_to_numeric,

        (Numeric, Integer) => numeric_to_integer,
        (Numeric, Float) => numeric_to_float,

        (Boolean, Integer) => boolean_to_integer,

        (Text, Integer) => text_to_integer,
        (Text, Float) => text_to_float,
        (Text, Numeric) => text_to_numeric,
        (Text, Boolean) => text_to_boolean,
        (Text, Binary) => text_to_binary,
        (Text, Date) => text_to_date,
        (Text, Timestamp) => text_to_timestamp,
        (Text, Time) => text_to_time,
        (Text, Json) => text_to_json,

        (Binary, Text) => binary_to_text,

        (Date, Timestamp) => date_to_timestamp,
        (Timestamp, Date) => timestamp_to_date,

        (_, Text) => display_as_text,

        _ => return None,
    };
    Some(convert)
}

fn integer_to_float(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Integer(n) if n.unsigned_abs() <= MAX_EXACT_FLOAT_INT as u64 => Ok(Value::Float(*n as f64)),
        Value::Integer(n) => Err(format!("{} is not exactly representable as a float", n)),
        other => Err(unexpected(other)),
    }
}

fn integer_to_numeric(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Integer(n) => Ok(Value::Numeric(n.to_string())),
        other => Err(unexpected(other)),
    }
}

fn integer_to_boolean(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Integer(0) => Ok(Value::Boolean(false)),
        Value::Integer(1) => Ok(Value::Boolean(true)),
        Value::Integer(n) => Err(format!("{} is neither 0 nor 1", n)),
        other => Err(unexpected(other)),
    }
}

fn float_to_integer(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Ok(Value::Integer(*f as i64))
        }
        Value::Float(f) => Err(format!("{} has no exact integer value", f)),
        other => Err(unexpected(other)),
    }
}

fn float_to_numeric(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Float(f) if f.is_finite() => Ok(Value::Numeric(f.to_string())),
        Value::Float(f) => Err(format!("{} has no decimal representation", f)),
        other => Err(unexpected(other)),
    }
}

fn numeric_to_integer(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Numeric(text) => {
            let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
            if !fraction.chars().all(|c| c == '0') {
                return Err(format!("{} has a fractional part", text));
            }
            whole
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| format!("{} is out of integer range", text))
        }
        other => Err(unexpected(other)),
    }
}

fn numeric_to_float(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Numeric(text) => match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Value::Float(f)),
            _ => Err(format!("{} does not fit a float", text)),
        },
        other => Err(unexpected(other)),
    }
}

fn boolean_to_integer(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
        other => Err(unexpected(other)),
    }
}

fn text_to_integer(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    text.trim()
        .parse::<i64>()
        .map(Value::Integer)
        .map_err(|_| format!("'{}' is not an integer", text))
}

fn text_to_float(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    match text.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Value::Float(f)),
        Ok(_) => Err(format!("'{}' is not a finite number", text)),
        Err(_) => Err(format!("'{}' is not a number", text)),
    }
}

fn text_to_numeric(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    canonical_decimal(text)
        .map(Value::Numeric)
        .ok_or_else(|| format!("'{}' is not a decimal number", text))
}

fn text_to_boolean(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Ok(Value::Boolean(true)),
        "false" | "f" | "no" | "0" => Ok(Value::Boolean(false)),
        _ => Err(format!("'{}' is not a boolean", text)),
    }
}

/// Accepts hex text with an optional `0x` or `\x` prefix.
fn text_to_binary(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix("\\x"))
        .unwrap_or(trimmed);
    hex::decode(digits)
        .map(Value::Binary)
        .map_err(|e| format!("content is not decodable as hex bytes: {}", e))
}

fn text_to_date(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map(Value::Date)
        .map_err(|_| format!("'{}' is not a date", text))
}

fn text_to_timestamp(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    parse_timestamp(text.trim())
        .map(Value::Timestamp)
        .ok_or_else(|| format!("'{}' is not a timestamp", text))
}

fn text_to_time(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    let trimmed = text.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map(Value::Time)
        .map_err(|_| format!("'{}' is not a time of day", text))
}

fn text_to_json(value: &Value) -> std::result::Result<Value, String> {
    let text = as_text(value)?;
    serde_json::from_str(text)
        .map(Value::Json)
        .map_err(|e| format!("invalid JSON: {}", e))
}

fn binary_to_text(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Binary(bytes) => String::from_utf8(bytes.clone())
            .map(Value::Text)
            .map_err(|e| format!("bytes are not valid UTF-8: {}", e)),
        other => Err(unexpected(other)),
    }
}

fn date_to_timestamp(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Date(date) => Ok(Value::Timestamp(date.and_time(NaiveTime::MIN))),
        other => Err(unexpected(other)),
    }
}

fn timestamp_to_date(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Timestamp(ts) if ts.time() == NaiveTime::MIN => Ok(Value::Date(ts.date())),
        Value::Timestamp(ts) => Err(format!("{} carries a time of day", ts)),
        other => Err(unexpected(other)),
    }
}

fn display_as_text(value: &Value) -> std::result::Result<Value, String> {
    Ok(Value::Text(value.to_string()))
}

fn as_text(value: &Value) -> std::result::Result<&str, String> {
    match value {
        Value::Text(text) => Ok(text),
        other => Err(unexpected(other)),
    }
}

fn unexpected(value: &Value) -> String {
    format!("unexpected value {:?}", value)
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

// =====================================================
// CASTING PLAN
// =====================================================

#[derive(Clone)]
pub struct CastRule {
    pub column: String,
    pub from: DataType,
    pub to: DataType,
    convert: Conversion,
}

impl std::fmt::Debug for CastRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastRule")
            .field("column", &self.column)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Column-wise conversions derived for one write. Columns without a rule are
/// passed through untouched.
#[derive(Clone, Debug, Default)]
pub struct CastingPlan {
    rules: Vec<CastRule>,
}

impl CastingPlan {
    pub fn rules(&self) -> &[CastRule] {
        &self.rules
    }

    pub fn rule(&self, column: &str) -> Option<&CastRule> {
        self.rules.iter().find(|r| r.column == column)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Casts every planned column of `table`. The first value that fails
    /// aborts with [`Error::CastType`] naming its column and row.
    pub fn apply(&self, table: TabularResult) -> Result<TabularResult> {
        if self.rules.is_empty() {
            return Ok(table);
        }

        let columns = table
            .into_columns()
            .into_iter()
            .map(|column| match self.rule(column.name()) {
                Some(rule) => rule.cast(column),
                None => Ok(column),
            })
            .collect::<Result<Vec<Column>>>()?;
        TabularResult::from_columns(columns)
    }
}

impl CastRule {
    fn cast(&self, column: Column) -> Result<Column> {
        let (name, _, values) = column.into_parts();
        let converted = values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                (self.convert)(value).map_err(|reason| Error::CastType {
                    column: name.clone(),
                    from: self.from,
                    to: self.to,
                    reason: format!("row {}: {}", index + 1, reason),
                })
            })
            .collect::<Result<Vec<Value>>>()?;
        Column::new(name, self.to, converted)
    }
}

/// Derives the casting plan for `table`.
///
/// The target type of a column is its override if one is given, otherwise
/// the semantic type the catalog reports. Columns the catalog does not list,
/// or lists with an unmapped native type, are left uncast. A pair with no
/// conversion fails with [`Error::CastType`]; an override naming a column
/// the table lacks is [`Error::InvalidInput`].
pub fn build_casting_plan(
    table: &TabularResult,
    catalog: Option<&ColumnTypeMap>,
    overrides: &TypeOverrides,
) -> Result<CastingPlan> {
    let mut unknown: Vec<&str> = overrides
        .keys()
        .map(String::as_str)
        .filter(|name| table.column(name).is_none())
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(Error::InvalidInput(format!(
            "type override names unknown column(s): {}",
            unknown.join(", ")
        )));
    }

    let mut rules = Vec::new();
    for column in table.columns() {
        let target = overrides
            .get(column.name())
            .copied()
            .or_else(|| catalog.and_then(|c| c.data_type(column.name())));
        let Some(to) = target else {
            continue;
        };

        let from = column.data_type();
        if from == to {
            continue;
        }

        let convert = conversion(from, to).ok_or_else(|| Error::CastType {
            column: column.name().to_string(),
            from,
            to,
            reason: "no conversion defined for this pair".to_string(),
        })?;
        log::debug!("Casting column '{}' from {} to {}", column.name(), from, to);
        rules.push(CastRule {
            column: column.name().to_string(),
            from,
            to,
            convert,
        });
    }

    Ok(CastingPlan { rules })
}

/// Builds the plan for `table` and applies it in one step.
pub fn reconcile(
    table: TabularResult,
    catalog: Option<&ColumnTypeMap>,
    overrides: &TypeOverrides,
) -> Result<TabularResult> {
    let plan = build_casting_plan(&table, catalog, overrides)?;
    plan.apply(table)
}
