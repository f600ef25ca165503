// =====================================================
// TABLE WRITER MODULE
// Chunked, sequential writes of a tabular result into one table
// =====================================================

use super::connections::SqlConnection;
use super::metadata::inspect_column_types;
use super::type_reconciler::build_casting_plan;
use crate::db_types::{ConflictPolicy, WriteOptions};
use crate::error::{DriverError, Error, Result};
use crate::table::TabularResult;
use std::fmt;
use std::ops::Range;

/// Splits `total` rows into consecutive zero-based ranges of at most `size`
/// rows, in order. `size` must be non-zero.
pub fn chunk_ranges(total: usize, size: usize) -> Vec<Range<usize>> {
    (0..total)
        .step_by(size.max(1))
        .map(|start| start..(start + size).min(total))
        .collect()
}

/// Writes `table` into `table_name` and returns the number of rows written.
///
/// When casting is requested the destination types are inspected (and any
/// overrides applied) before anything is modified. Chunks are then written
/// one after another, each in its own transaction. The first failing chunk
/// stops the write with [`Error::Write`] naming its 1-based row range; the
/// chunks before it stay committed and are reported in `rows_written`.
pub async fn write_table<C>(
    conn: &mut C,
    table: TabularResult,
    table_name: &str,
    options: &WriteOptions,
) -> Result<usize>
where
    C: SqlConnection + ?Sized,
{
    if options.chunk_size == 0 {
        return Err(Error::InvalidInput("chunk size must be greater than zero".into()));
    }
    if table_name.trim().is_empty() {
        return Err(Error::InvalidInput("table name must not be empty".into()));
    }
    if table.columns().is_empty() {
        report(
            options.verbose,
            format_args!("Nothing to write to '{}': no columns", table_name),
        );
        return Ok(0);
    }

    let table = if options.needs_casting() {
        cast_for_destination(conn, table, table_name, options).await?
    } else {
        table
    };

    let total = table.row_count();
    let chunks = chunk_ranges(total, options.chunk_size);
    let first_chunk = chunks.first().cloned().unwrap_or(0..0);

    prepare_destination(conn, &table, table_name, options.if_exists)
        .await
        .map_err(|source| write_error(table_name, &first_chunk, 0, source))?;

    let mut written = 0;
    for (index, range) in chunks.iter().enumerate() {
        if let Err(source) = conn.insert_rows(table_name, &table, range.clone()).await {
            log::warn!(
                "Chunk {}/{} (rows {}-{}) of '{}' failed after {} rows were committed",
                index + 1,
                chunks.len(),
                range.start + 1,
                range.end,
                table_name,
                written
            );
            return Err(write_error(table_name, range, written, PrepareError::Driver(source)));
        }
        written += range.len();
        report(
            options.verbose,
            format_args!(
                "Wrote chunk {}/{} (rows {}-{} of {}) to '{}'",
                index + 1,
                chunks.len(),
                range.start + 1,
                range.end,
                total,
                table_name
            ),
        );
    }

    Ok(written)
}

async fn cast_for_destination<C>(
    conn: &mut C,
    table: TabularResult,
    table_name: &str,
    options: &WriteOptions,
) -> Result<TabularResult>
where
    C: SqlConnection + ?Sized,
{
    let catalog = if options.retrieve_types {
        Some(inspect_column_types(conn, table_name).await?)
    } else {
        None
    };

    let plan = build_casting_plan(&table, catalog.as_ref(), &options.type_overrides)?;
    for rule in plan.rules() {
        report(
            options.verbose,
            format_args!("Casting column '{}' from {} to {}", rule.column, rule.from, rule.to),
        );
    }
    plan.apply(table)
}

/// Applies the conflict policy so the destination exists with the right
/// shape before the first chunk is written.
async fn prepare_destination<C>(
    conn: &mut C,
    table: &TabularResult,
    table_name: &str,
    policy: ConflictPolicy,
) -> std::result::Result<(), PrepareError>
where
    C: SqlConnection + ?Sized,
{
    let exists = conn.table_exists(table_name).await?;
    match (policy, exists) {
        (ConflictPolicy::Fail, true) => Err(PrepareError::Exists),
        (ConflictPolicy::Append, true) => Ok(()),
        (ConflictPolicy::Replace, true) => {
            conn.drop_table(table_name).await?;
            conn.create_table(table_name, table).await?;
            Ok(())
        }
        (_, false) => {
            conn.create_table(table_name, table).await?;
            Ok(())
        }
    }
}

enum PrepareError {
    Exists,
    Driver(DriverError),
}

impl From<DriverError> for PrepareError {
    fn from(source: DriverError) -> Self {
        PrepareError::Driver(source)
    }
}

fn write_error(
    table_name: &str,
    range: &Range<usize>,
    rows_written: usize,
    source: PrepareError,
) -> Error {
    match source {
        PrepareError::Exists => Error::TableExists(table_name.to_string()),
        PrepareError::Driver(source) => Error::Write {
            table: table_name.to_string(),
            first_row: range.start + 1,
            last_row: range.end,
            rows_written,
            source,
        },
    }
}

fn report(verbose: bool, message: fmt::Arguments<'_>) {
    if verbose {
        log::info!("{}", message);
    } else {
        log::debug!("{}", message);
    }
}

#[cfg(test)]
mod tests;
