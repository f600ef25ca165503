// =====================================================
// DATA EXPORT
// Sends a set of named tables to SQL tables or CSV files
// =====================================================

use crate::db::connections::SqlConnection;
use crate::db::data_transfer::write_table;
use crate::db_types::WriteOptions;
use crate::error::{Error, Result};
use crate::table::{TabularResult, Value};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ExportedTable {
    pub name: String,
    pub rows_written: usize,
}

/// Writes each `(name, table)` pair to `{prefix}{name}` in order.
///
/// The first failing table stops the export and its error is returned;
/// tables exported before it stay written. Nothing is retried.
pub async fn export_tables_to_sql<C>(
    conn: &mut C,
    tables: Vec<(String, TabularResult)>,
    prefix: &str,
    options: &WriteOptions,
) -> Result<Vec<ExportedTable>>
where
    C: SqlConnection + ?Sized,
{
    let mut exported = Vec::with_capacity(tables.len());
    for (name, table) in tables {
        let table_name = format!("{}{}", prefix, name);
        let rows_written = write_table(conn, table, &table_name, options).await?;
        if options.verbose {
            log::info!("Exported {} rows to '{}'", rows_written, table_name);
        }
        exported.push(ExportedTable {
            name: table_name,
            rows_written,
        });
    }
    Ok(exported)
}

/// Writes each `(name, table)` pair as `{output_dir}/{prefix}{name}.csv`
/// with a header row; nulls become empty cells.
pub fn export_tables_to_csv(
    tables: &[(String, TabularResult)],
    output_dir: impl AsRef<Path>,
    prefix: &str,
) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir).map_err(|e| {
        Error::InvalidInput(format!(
            "Failed to create output directory {}: {}",
            output_dir.display(),
            e
        ))
    })?;

    tables
        .iter()
        .map(|(name, table)| {
            let path = output_dir.join(format!("{}{}.csv", prefix, name));
            write_csv(table, &path)?;
            log::debug!("Saved {} rows to {}", table.row_count(), path.display());
            Ok(path)
        })
        .collect()
}

fn write_csv(table: &TabularResult, path: &Path) -> Result<()> {
    let csv_error = |e: csv::Error| Error::InvalidInput(format!("Failed to write {}: {}", path.display(), e));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;

    writer.write_record(table.column_names()).map_err(csv_error)?;
    for index in 0..table.row_count() {
        if let Some(row) = table.row(index) {
            writer
                .write_record(row.into_iter().map(csv_cell))
                .map_err(csv_error)?;
        }
    }

    writer
        .flush()
        .map_err(|e| Error::InvalidInput(format!("Failed to flush {}: {}", path.display(), e)))
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
