use async_trait::async_trait;

use crate::error::LoaderResult;
use crate::types::{record::Record, report::LoadResult, resource::ResourceDescriptor, table::TableSpec};

/// Transactional, idempotent sink for extracted records.
///
/// A run is `begin_run`, any number of `load` calls in tier order, then
/// exactly one of `commit_run` or `rollback_run`. Nothing written inside a
/// run is visible outside it until commit.
#[async_trait]
pub trait Loader: Send {
    /// Open the run and prepare the schema for `tables`.
    async fn begin_run(&mut self, tables: &[&'static TableSpec]) -> LoaderResult<()>;

    /// Upsert one resource's records, keyed by its primary key.
    async fn load(
        &mut self,
        descriptor: &ResourceDescriptor,
        records: &[Record],
    ) -> LoaderResult<LoadResult>;

    async fn commit_run(&mut self) -> LoaderResult<()>;

    /// Discard everything written since `begin_run`. A no-op outside a run.
    async fn rollback_run(&mut self) -> LoaderResult<()>;
}
