//! In-memory load target for tests and dry runs.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::debug;

use super::{batch_rows, check_missing, referenced_keys, table_of};
use crate::error::{LoadError, LoaderResult};
use crate::traits::loader::Loader;
use crate::types::config::ReferencePolicy;
use crate::types::record::Record;
use crate::types::report::LoadResult;
use crate::types::resource::ResourceDescriptor;
use crate::types::table::{SqlValue, TableSpec};

/// Rows of one table by primary key, in insertion order.
type Table = IndexMap<String, Vec<SqlValue>>;

/// Loader backed by in-memory tables.
///
/// A run works on a staged copy of the committed tables; commit publishes
/// the copy and rollback drops it.
pub struct MemoryLoader {
    tenant_id: String,
    reference_policy: ReferencePolicy,
    specs: HashMap<&'static str, &'static TableSpec>,
    committed: HashMap<&'static str, Table>,
    staged: Option<HashMap<&'static str, Table>>,
    commits: u32,
}

impl MemoryLoader {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            reference_policy: ReferencePolicy::default(),
            specs: HashMap::new(),
            committed: HashMap::new(),
            staged: None,
            commits: 0,
        }
    }

    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.reference_policy = policy;
        self
    }

    /// A committed column value.
    pub fn value(&self, table: &str, key: &str, column: &str) -> Option<&SqlValue> {
        let index = self.specs.get(table)?.column_index(column)?;
        self.committed.get(table)?.get(key)?.get(index)
    }

    /// Committed rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.committed.get(table).map_or(0, IndexMap::len)
    }

    /// Committed primary keys of `table`, in first-insert order.
    pub fn keys(&self, table: &str) -> Vec<String> {
        self.committed
            .get(table)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn in_run(&self) -> bool {
        self.staged.is_some()
    }

    /// Successful commits so far.
    pub fn commits(&self) -> u32 {
        self.commits
    }
}

#[async_trait]
impl Loader for MemoryLoader {
    async fn begin_run(&mut self, tables: &[&'static TableSpec]) -> LoaderResult<()> {
        if self.staged.is_some() {
            return Err(LoadError::RunInProgress);
        }
        let mut staged = self.committed.clone();
        for table in tables {
            self.specs.insert(table.name, table);
            staged.entry(table.name).or_default();
        }
        self.staged = Some(staged);
        Ok(())
    }

    async fn load(
        &mut self,
        descriptor: &ResourceDescriptor,
        records: &[Record],
    ) -> LoaderResult<LoadResult> {
        let table = table_of(descriptor)?;
        let staged = self.staged.as_mut().ok_or(LoadError::NoActiveRun)?;
        let rows = batch_rows(table, descriptor, records, &self.tenant_id)?;

        for reference in table.references {
            let target = staged.get(reference.resource);
            let missing = referenced_keys(table, reference, &rows)
                .into_iter()
                .filter(|key| !target.is_some_and(|t| t.contains_key(key)))
                .collect();
            check_missing(self.reference_policy, descriptor, reference, missing)?;
        }

        self.specs.insert(table.name, table);
        let target = staged.entry(table.name).or_default();
        let mutable: Vec<usize> = table
            .mutable_columns()
            .filter_map(|c| table.column_index(c.name))
            .collect();

        for row in &rows {
            match target.get_mut(&row.key) {
                Some(existing) => {
                    for &index in &mutable {
                        existing[index] = row.values[index].clone();
                    }
                }
                None => {
                    target.insert(row.key.clone(), row.values.clone());
                }
            }
        }

        debug!(resource = descriptor.name, rows = rows.len(), "Staged rows");
        Ok(LoadResult {
            resource: descriptor.name.to_string(),
            inserted_or_updated_count: rows.len() as u64,
        })
    }

    async fn commit_run(&mut self) -> LoaderResult<()> {
        let staged = self.staged.take().ok_or(LoadError::NoActiveRun)?;
        self.committed = staged;
        self.commits += 1;
        Ok(())
    }

    async fn rollback_run(&mut self) -> LoaderResult<()> {
        self.staged = None;
        Ok(())
    }
}
