//! PostgreSQL load target.
//!
//! One run is one transaction: schema preparation and every resource's
//! upserts either all commit or all roll back.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Transaction};
use tracing::{debug, info, instrument};

use super::{batch_rows, check_missing, referenced_keys, table_of};
use crate::error::{LoadError, LoaderResult};
use crate::traits::loader::Loader;
use crate::types::config::LoadConfig;
use crate::types::record::Record;
use crate::types::report::LoadResult;
use crate::types::resource::ResourceDescriptor;
use crate::types::table::{quote_ident, ForeignRef, Row, SqlValue, TableSpec};

/// Loader writing into Postgres through sqlx.
pub struct PostgresLoader {
    pool: PgPool,
    config: LoadConfig,
    tenant_id: String,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresLoader {
    pub fn new(pool: PgPool, config: LoadConfig, tenant_id: impl Into<String>) -> Self {
        Self {
            pool,
            config,
            tenant_id: tenant_id.into(),
            tx: None,
        }
    }

    fn tx(&mut self) -> LoaderResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(LoadError::NoActiveRun)
    }

    /// Ids referenced by the batch that the referenced table lacks.
    async fn missing_keys(&mut self, reference: &ForeignRef, keys: Vec<String>) -> LoaderResult<Vec<String>> {
        if keys.is_empty() {
            return Ok(keys);
        }
        let sql = format!(
            "SELECT v.id FROM UNNEST($1::text[]) AS v(id) \
             WHERE NOT EXISTS (SELECT 1 FROM {} t WHERE t.{} = v.id)",
            quote_ident(reference.resource),
            quote_ident(reference.key)
        );
        let tx = self.tx()?;
        let missing = sqlx::query_scalar::<_, String>(&sql)
            .bind(keys)
            .fetch_all(&mut **tx)
            .await?;
        Ok(missing)
    }

    /// Multi-row upsert of one chunk. Returns rows written.
    async fn upsert_chunk(&mut self, table: &TableSpec, rows: &[Row]) -> LoaderResult<u64> {
        let mut query = upsert_builder(table, rows);
        let tx = self.tx()?;
        let result = query.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Loader for PostgresLoader {
    #[instrument(skip(self, tables), fields(tables = tables.len()))]
    async fn begin_run(&mut self, tables: &[&'static TableSpec]) -> LoaderResult<()> {
        if self.tx.is_some() {
            return Err(LoadError::RunInProgress);
        }
        let mut tx = self.pool.begin().await?;

        if let Some(schema) = &self.config.schema {
            let schema = quote_ident(schema);
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
                .execute(&mut *tx)
                .await?;
            sqlx::query(&format!("SET LOCAL search_path TO {}", schema))
                .execute(&mut *tx)
                .await?;
        }

        for table in tables {
            for statement in table.ddl() {
                sqlx::query(&statement).execute(&mut *tx).await?;
            }
        }

        debug!(schema = ?self.config.schema, "Schema prepared");
        self.tx = Some(tx);
        Ok(())
    }

    #[instrument(skip(self, descriptor, records), fields(resource = descriptor.name, records = records.len()))]
    async fn load(
        &mut self,
        descriptor: &ResourceDescriptor,
        records: &[Record],
    ) -> LoaderResult<LoadResult> {
        let table = table_of(descriptor)?;
        self.tx()?;
        let rows = batch_rows(table, descriptor, records, &self.tenant_id)?;

        for reference in table.references {
            let keys = referenced_keys(table, reference, &rows);
            let missing = self.missing_keys(reference, keys).await?;
            check_missing(self.config.reference_policy, descriptor, reference, missing)?;
        }

        let chunk_size = chunk_rows(table, self.config.chunk_size);
        let mut written = 0;
        for chunk in rows.chunks(chunk_size) {
            written += self.upsert_chunk(table, chunk).await?;
            debug!(chunk = chunk.len(), written, "Upserted chunk");
        }

        Ok(LoadResult {
            resource: descriptor.name.to_string(),
            inserted_or_updated_count: written,
        })
    }

    async fn commit_run(&mut self) -> LoaderResult<()> {
        let tx = self.tx.take().ok_or(LoadError::NoActiveRun)?;
        tx.commit().await?;
        info!("Load transaction committed");
        Ok(())
    }

    async fn rollback_run(&mut self) -> LoaderResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            info!("Load transaction rolled back");
        }
        Ok(())
    }
}

/// Postgres accepts at most this many bind parameters per statement.
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// Rows per statement: the configured size, capped so a chunk of `table`
/// rows stays within the bind parameter limit.
fn chunk_rows(table: &TableSpec, configured: usize) -> usize {
    let cap = (MAX_BIND_PARAMS / table.columns.len().max(1)).max(1);
    configured.clamp(1, cap)
}

/// `INSERT .. VALUES .. ON CONFLICT (pk) DO UPDATE SET <mutable> = EXCLUDED.<mutable>`.
fn upsert_builder<'args>(table: &TableSpec, rows: &'args [Row]) -> QueryBuilder<'args, Postgres> {
    let columns = table
        .columns
        .iter()
        .map(|c| quote_ident(c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut query = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        quote_ident(table.name),
        columns
    ));
    query.push_values(rows, |mut values, row| {
        for value in &row.values {
            bind_value(&mut values, value);
        }
    });

    let updates = table
        .mutable_columns()
        .map(|c| format!("{0} = EXCLUDED.{0}", quote_ident(c.name)))
        .collect::<Vec<_>>();
    query.push(format!(" ON CONFLICT ({}) ", quote_ident(table.primary_key)));
    if updates.is_empty() {
        query.push("DO NOTHING");
    } else {
        query.push("DO UPDATE SET ");
        query.push(updates.join(", "));
    }
    query
}

fn bind_value<'qb, 'args: 'qb>(values: &mut Separated<'qb, 'args, Postgres, &'static str>, value: &SqlValue) {
    match value {
        SqlValue::Text(v) => values.push_bind(v.clone()),
        SqlValue::Bool(v) => values.push_bind(*v),
        SqlValue::Numeric(v) => values.push_bind(*v),
        SqlValue::BigInt(v) => values.push_bind(*v),
        SqlValue::Json(v) => values.push_bind(v.clone().map(sqlx::types::Json)),
    };
}
