//! Load targets.
//!
//! Available backends:
//! - `MemoryLoader` - in-memory tables with staged runs (tests, dry runs)
//! - `PostgresLoader` - one Postgres transaction per run

pub mod memory;
pub mod postgres;

pub use memory::MemoryLoader;
pub use postgres::PostgresLoader;

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::warn;

use crate::error::{LoadError, LoaderResult};
use crate::types::config::ReferencePolicy;
use crate::types::record::Record;
use crate::types::resource::ResourceDescriptor;
use crate::types::table::{ForeignRef, Row, TableSpec};

/// The target table of `descriptor`, or `NoTable` for extract-only resources.
pub(crate) fn table_of(descriptor: &ResourceDescriptor) -> LoaderResult<&'static TableSpec> {
    descriptor.table.ok_or_else(|| LoadError::NoTable {
        resource: descriptor.name.to_string(),
    })
}

/// Map a batch to rows. A key repeated within the batch keeps its first
/// position and its last value.
pub(crate) fn batch_rows(
    table: &TableSpec,
    descriptor: &ResourceDescriptor,
    records: &[Record],
    tenant: &str,
) -> LoaderResult<Vec<Row>> {
    let mut rows: IndexMap<String, Row> = IndexMap::with_capacity(records.len());
    for record in records {
        let row = table.row(descriptor.name, descriptor.primary_key_field, record, tenant)?;
        rows.insert(row.key.clone(), row);
    }
    Ok(rows.into_values().collect())
}

/// Distinct non-null values of a reference column, in first-seen order.
pub(crate) fn referenced_keys(table: &TableSpec, reference: &ForeignRef, rows: &[Row]) -> Vec<String> {
    let Some(index) = table.column_index(reference.column) else {
        return Vec::new();
    };
    let mut keys: Vec<String> = rows.iter().filter_map(|r| r.values[index].as_key()).collect();
    let mut seen = HashSet::new();
    keys.retain(|k| seen.insert(k.clone()));
    keys
}

/// Apply the reference policy to the ids a batch references but the target lacks.
pub(crate) fn check_missing(
    policy: ReferencePolicy,
    descriptor: &ResourceDescriptor,
    reference: &ForeignRef,
    missing: Vec<String>,
) -> LoaderResult<()> {
    if missing.is_empty() {
        return Ok(());
    }
    match policy {
        ReferencePolicy::Enforce => Err(LoadError::DanglingReference {
            resource: descriptor.name.to_string(),
            column: reference.column.to_string(),
            referenced: reference.resource.to_string(),
            missing,
        }),
        ReferencePolicy::Warn => {
            warn!(
                resource = descriptor.name,
                column = reference.column,
                referenced = reference.resource,
                missing = missing.len(),
                "Batch references rows that were never loaded"
            );
            Ok(())
        }
    }
}
