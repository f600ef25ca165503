// =====================================================
// QUERY EXECUTION MODULE
// Runs a single query and materializes its result table
// =====================================================

use super::connections::SqlConnection;
use crate::error::{Error, Result};
use crate::table::TabularResult;

/// Executes `query` on `conn` and returns its first result set.
///
/// A failing query is reported once as [`Error::Query`] carrying the dialect
/// and the query text; it is never retried.
pub async fn read_table<C>(conn: &mut C, query: &str) -> Result<TabularResult>
where
    C: SqlConnection + ?Sized,
{
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".into()));
    }

    let dialect = conn.dialect();
    let started = std::time::Instant::now();
    let result = conn.fetch(query).await.map_err(|source| Error::Query {
        dialect,
        query: query.to_string(),
        source,
    })?;

    log::debug!(
        "{} query returned {} rows x {} columns in {:?}",
        dialect,
        result.row_count(),
        result.columns().len(),
        started.elapsed()
    );
    Ok(result)
}

#[cfg(test)]
mod tests;
