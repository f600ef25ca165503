// =====================================================
// TABULAR TOOLKIT
// JSON records and CSV payloads to and from TabularResult
// =====================================================

use crate::db_types::DataType;
use crate::error::{Error, Result};
use crate::table::{Column, TabularResult, Value};
use serde_json::{Map, Value as JsonValue};
use std::io::Read;

pub const DEFAULT_SEPARATOR: &str = "_";

static JSON_NULL: JsonValue = JsonValue::Null;

// --- JSON Flattening ---

/// Flattens nested objects into one level, joining keys with `sep`.
///
/// Lists whose items are all objects are expanded with their index
/// (`customFields_0_id`); lists of scalars are kept as they are. Keys listed
/// in `ignore_keys` keep their value unflattened.
pub fn flatten_json(record: &Map<String, JsonValue>, sep: &str, ignore_keys: &[&str]) -> Map<String, JsonValue> {
    let mut flattened = Map::new();
    flatten_into(&mut flattened, record, "", sep, ignore_keys);
    flattened
}

fn flatten_into(
    out: &mut Map<String, JsonValue>,
    record: &Map<String, JsonValue>,
    parent: &str,
    sep: &str,
    ignore_keys: &[&str],
) {
    for (key, value) in record {
        let new_key = if parent.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", parent, sep, key)
        };

        if ignore_keys.contains(&key.as_str()) {
            out.insert(new_key, value.clone());
            continue;
        }

        match value {
            JsonValue::Object(nested) => flatten_into(out, nested, &new_key, sep, ignore_keys),
            JsonValue::Array(items) if !items.is_empty() && items.iter().all(JsonValue::is_object) => {
                for (index, item) in items.iter().enumerate() {
                    if let JsonValue::Object(nested) = item {
                        let indexed = format!("{}{}{}", new_key, sep, index);
                        flatten_into(out, nested, &indexed, sep, ignore_keys);
                    }
                }
            }
            other => {
                out.insert(new_key, other.clone());
            }
        }
    }
}

/// Reverses [`flatten_json`]: keys are split on `sep` and purely numeric
/// segments become list positions.
///
/// Keys that cannot share one structure, such as `a_0` next to `a_b` or `a`
/// next to `a_b`, fail with [`Error::InvalidInput`] instead of one of them
/// being dropped.
pub fn unflatten_json(flat: &Map<String, JsonValue>, sep: &str) -> Result<JsonValue> {
    let mut root = JsonValue::Object(Map::new());
    for (key, value) in flat {
        let path: Vec<&str> = key.split(sep).collect();
        insert_path(&mut root, &path, value.clone()).map_err(|conflict| {
            Error::InvalidInput(format!("flattened key '{}' conflicts with {}", key, conflict))
        })?;
    }
    Ok(root)
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

fn insert_path(target: &mut JsonValue, path: &[&str], value: JsonValue) -> std::result::Result<(), String> {
    let Some((key, rest)) = path.split_first() else {
        return Ok(());
    };

    let slot = match target {
        JsonValue::Object(map) => map.entry(key.to_string()).or_insert(JsonValue::Null),
        JsonValue::Array(items) => {
            let index = key
                .parse::<usize>()
                .map_err(|_| format!("a list at segment '{}'", key))?;
            if items.len() <= index {
                items.resize(index + 1, JsonValue::Null);
            }
            &mut items[index]
        }
        _ => return Err(format!("a value at segment '{}'", key)),
    };

    match rest.first() {
        None if slot.is_object() || slot.is_array() => Err(format!("nested keys under '{}'", key)),
        None => {
            *slot = value;
            Ok(())
        }
        Some(next) => {
            if slot.is_null() {
                *slot = if is_index(next) {
                    JsonValue::Array(Vec::new())
                } else {
                    JsonValue::Object(Map::new())
                };
            } else if !(slot.is_object() || slot.is_array()) {
                return Err(format!("the value at '{}'", key));
            }
            insert_path(slot, rest, value)
        }
    }
}

/// `id` field of every record that has one.
pub fn get_all_ids(records: &[JsonValue]) -> Vec<JsonValue> {
    records.iter().filter_map(|record| record.get("id").cloned()).collect()
}

// --- JSON Records ---

/// Builds a table from a JSON array of objects (or a single object).
///
/// Columns appear in first-seen key order; a record missing a key yields a
/// null. Column types are inferred from the non-null values: booleans,
/// integers, numbers, strings, otherwise JSON.
pub fn json_to_table(records: &JsonValue, flatten: bool, sep: &str, ignore_keys: &[&str]) -> Result<TabularResult> {
    let objects: Vec<&Map<String, JsonValue>> = match records {
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_object().ok_or_else(|| {
                    Error::InvalidInput(format!("record {} is not a JSON object", index + 1))
                })
            })
            .collect::<Result<_>>()?,
        JsonValue::Object(object) => vec![object],
        _ => return Err(Error::InvalidInput("expected a JSON object or array of objects".into())),
    };

    let rows: Vec<Map<String, JsonValue>> = objects
        .into_iter()
        .map(|object| {
            if flatten {
                flatten_json(object, sep, ignore_keys)
            } else {
                object.clone()
            }
        })
        .collect();

    let mut names: Vec<String> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let cells: Vec<&JsonValue> = rows
                .iter()
                .map(|row| row.get(&name).unwrap_or(&JSON_NULL))
                .collect();
            let data_type = infer_json_type(&cells);
            let values = cells.into_iter().map(|cell| json_cell(cell, data_type)).collect();
            Column::new(name, data_type, values)
        })
        .collect::<Result<Vec<_>>>()?;

    TabularResult::from_columns(columns)
}

fn infer_json_type(cells: &[&JsonValue]) -> DataType {
    let present: Vec<&JsonValue> = cells.iter().copied().filter(|cell| !cell.is_null()).collect();
    if present.is_empty() {
        DataType::Text
    } else if present.iter().all(|cell| cell.is_boolean()) {
        DataType::Boolean
    } else if present.iter().all(|cell| cell.is_i64()) {
        DataType::Integer
    } else if present.iter().all(|cell| cell.is_number()) {
        DataType::Float
    } else if present.iter().all(|cell| cell.is_string()) {
        DataType::Text
    } else {
        DataType::Json
    }
}

fn json_cell(cell: &JsonValue, data_type: DataType) -> Value {
    if cell.is_null() {
        return Value::Null;
    }
    match data_type {
        DataType::Boolean => cell.as_bool().map(Value::Boolean).unwrap_or(Value::Null),
        DataType::Integer => cell.as_i64().map(Value::Integer).unwrap_or(Value::Null),
        DataType::Float => cell.as_f64().map(Value::Float).unwrap_or(Value::Null),
        DataType::Text => cell
            .as_str()
            .map(|s| Value::Text(s.to_string()))
            .unwrap_or(Value::Null),
        _ => Value::Json(cell.clone()),
    }
}

/// Renders each row as a JSON object keyed by column name, optionally
/// unflattened on `sep`.
pub fn table_to_json(table: &TabularResult, unflatten: bool, sep: &str) -> Result<Vec<JsonValue>> {
    (0..table.row_count())
        .filter_map(|index| table.row(index))
        .map(|row| {
            let record: Map<String, JsonValue> = table
                .columns()
                .iter()
                .zip(row)
                .map(|(column, value)| (column.name().to_string(), value.to_json()))
                .collect();
            if unflatten {
                unflatten_json(&record, sep)
            } else {
                Ok(JsonValue::Object(record))
            }
        })
        .collect()
}

// --- CSV ---

/// Reads headed CSV into a table. Each column is typed integer, float or
/// boolean when every non-empty cell parses as one, else text; empty cells
/// are null. `nan` and `inf` do not make a column float.
pub fn csv_to_table<R: Read>(reader: R) -> Result<TabularResult> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("Failed to read CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| Error::InvalidInput(format!("Failed to read CSV record {}: {}", index + 1, e)))?;
        if record.len() != headers.len() {
            return Err(Error::InvalidInput(format!(
                "CSV record {} has {} fields, expected {}",
                index + 1,
                record.len(),
                headers.len()
            )));
        }
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| {
            let data_type = infer_csv_type(&raw);
            let values = raw.iter().map(|cell| csv_cell(cell, data_type)).collect();
            Column::new(name, data_type, values)
        })
        .collect::<Result<Vec<_>>>()?;

    TabularResult::from_columns(columns)
}

fn infer_csv_type(cells: &[String]) -> DataType {
    let present: Vec<&str> = cells.iter().map(String::as_str).filter(|c| !c.is_empty()).collect();
    if present.is_empty() {
        DataType::Text
    } else if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        DataType::Integer
    } else if present.iter().all(|c| c.parse::<f64>().is_ok_and(f64::is_finite)) {
        DataType::Float
    } else if present.iter().all(|c| parse_csv_bool(c).is_some()) {
        DataType::Boolean
    } else {
        DataType::Text
    }
}

fn parse_csv_bool(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn csv_cell(cell: &str, data_type: DataType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match data_type {
        DataType::Integer => cell.parse().map(Value::Integer).unwrap_or(Value::Null),
        DataType::Float => cell.parse().map(Value::Float).unwrap_or(Value::Null),
        DataType::Boolean => parse_csv_bool(cell).map(Value::Boolean).unwrap_or(Value::Null),
        _ => Value::Text(cell.to_string()),
    }
}
