// =====================================================
// CATALOG METADATA MODULE
// Reads a destination table's column types from information_schema
// =====================================================

use super::connections::SqlConnection;
use super::sql_utils::build_postgres_column_types_query;
use crate::db_types::{DataType, Dialect};
use crate::error::{Error, Result};
use crate::table::{Column, TabularResult, Value};
use serde::Serialize;

/// One catalog entry: the native type as the database reports it and its
/// semantic counterpart, if any.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub native_type: String,
    pub data_type: Option<DataType>,
}

/// Column name to semantic type for one table, in ordinal order. Built fresh
/// for every write; never cached.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ColumnTypeMap {
    pub table: String,
    pub columns: Vec<CatalogColumn>,
}

impl ColumnTypeMap {
    pub fn get(&self, column: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|c| c.name == column)
    }

    /// Semantic type of `column`; `None` when absent or unmapped.
    pub fn data_type(&self, column: &str) -> Option<DataType> {
        self.get(column).and_then(|c| c.data_type)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Queries the catalog for the columns of `table`.
///
/// Only postgres is supported; the other dialects fail with
/// [`Error::UnsupportedDialect`] instead of returning a partial map. A table
/// with no catalog rows is [`Error::NotFound`].
pub async fn inspect_column_types<C>(conn: &mut C, table: &str) -> Result<ColumnTypeMap>
where
    C: SqlConnection + ?Sized,
{
    let dialect = conn.dialect();
    if dialect != Dialect::Postgres {
        return Err(Error::UnsupportedDialect {
            dialect,
            operation: "column type inspection",
        });
    }

    let query = build_postgres_column_types_query(table);
    let catalog = conn.fetch(&query).await.map_err(|source| Error::Connection {
        dialect,
        dsn: conn.dsn().to_string(),
        source,
    })?;

    let columns = catalog_columns(&catalog)?;
    if columns.is_empty() {
        return Err(Error::NotFound {
            table: table.to_string(),
        });
    }

    log::debug!("Catalog lists {} columns for '{}'", columns.len(), table);
    Ok(ColumnTypeMap {
        table: table.to_string(),
        columns,
    })
}

fn catalog_columns(catalog: &TabularResult) -> Result<Vec<CatalogColumn>> {
    if catalog.is_empty() {
        return Ok(Vec::new());
    }
    let names = catalog_field(catalog, "column_name")?;
    let types = catalog_field(catalog, "data_type")?;

    names
        .values()
        .iter()
        .zip(types.values())
        .map(|(name, native)| match (name, native) {
            (Value::Text(name), Value::Text(native)) => Ok(CatalogColumn {
                name: name.clone(),
                native_type: native.clone(),
                data_type: DataType::from_native(native),
            }),
            other => Err(Error::InvalidInput(format!(
                "unexpected catalog row {:?}",
                other
            ))),
        })
        .collect()
}

fn catalog_field<'a>(catalog: &'a TabularResult, name: &str) -> Result<&'a Column> {
    catalog
        .column(name)
        .ok_or_else(|| Error::InvalidInput(format!("catalog result has no '{}' column", name)))
}
