//! Sequences extraction and loading over the catalog, tier by tier.

use chrono::{DateTime, Utc};
use proxy_client::{ApiPath, ApiRequest, Gateway};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::extract::{Extraction, Extractor};
use super::ledger::DedupLedger;
use crate::artifacts::ArtifactStore;
use crate::catalog::Catalog;
use crate::error::{Result, SyncError};
use crate::traits::loader::Loader;
use crate::traits::sink::{ProgressEvent, ProgressSink};
use crate::types::config::SyncConfig;
use crate::types::record::Record;
use crate::types::report::{ExtractStats, ResourceReport, RunReport};
use crate::types::resource::ResourceDescriptor;

/// Resource used for the pre-flight probe.
const PROBE_RESOURCE: &str = "stores";

/// Drives a sync run.
///
/// Within a tier every resource is extracted then loaded before the next
/// tier starts. Extraction failures degrade to partial data; any load
/// failure rolls the whole run back.
pub struct Orchestrator<G: Gateway> {
    config: SyncConfig,
    catalog: Catalog,
    gateway: G,
    sink: Arc<dyn ProgressSink>,
    artifacts: Option<ArtifactStore>,
    now: Option<DateTime<Utc>>,
}

impl<G: Gateway> Orchestrator<G> {
    pub fn new(config: SyncConfig, catalog: Catalog, gateway: G, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            config,
            catalog,
            gateway,
            sink,
            artifacts: None,
            now: None,
        }
    }

    /// Write one artifact per resource plus a summary.
    pub fn with_artifacts(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    /// Pin the end of the last search window.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Extract and load every resource inside a single load run.
    #[instrument(skip(self, loader), fields(tenant = %self.config.tenant_id, resources = self.catalog.len()))]
    pub async fn run<L: Loader + ?Sized>(&self, loader: &mut L) -> Result<RunReport> {
        self.preflight().await?;

        loader
            .begin_run(&self.catalog.tables())
            .await
            .map_err(SyncError::Prepare)?;

        let mut report = RunReport::default();
        for (tier, resources) in self.catalog.tiers() {
            self.announce(tier, &resources);
            for descriptor in resources {
                let extraction = self.extractor().extract(descriptor, self.sink.as_ref()).await;

                if let Err(e) = self.persist(&extraction).await {
                    self.abort(loader, descriptor.name, &e.to_string()).await;
                    return Err(e);
                }

                let loaded = match descriptor.table {
                    Some(_) => match loader.load(descriptor, &extraction.records).await {
                        Ok(result) => {
                            self.sink.emit(ProgressEvent::ResourceLoaded {
                                resource: descriptor.name.to_string(),
                                rows: result.inserted_or_updated_count,
                            });
                            Some(result.inserted_or_updated_count)
                        }
                        Err(source) => {
                            self.abort(loader, descriptor.name, &source.to_string()).await;
                            return Err(SyncError::Load {
                                resource: descriptor.name.to_string(),
                                source,
                            });
                        }
                    },
                    None => None,
                };

                report.resources.push(resource_report(descriptor, extraction, loaded));
            }
        }

        loader.commit_run().await.map_err(SyncError::Commit)?;
        report.committed = true;
        self.sink.emit(ProgressEvent::RunCommitted {
            resources: report.resources.len(),
        });

        self.persist_summary(&report).await?;
        self.log_outcome(&report);
        Ok(report)
    }

    /// Extract every resource and write artifacts, without loading.
    #[instrument(skip(self), fields(tenant = %self.config.tenant_id, resources = self.catalog.len()))]
    pub async fn extract_only(&self) -> Result<RunReport> {
        self.preflight().await?;

        let mut report = RunReport::default();
        for (tier, resources) in self.catalog.tiers() {
            self.announce(tier, &resources);
            for descriptor in resources {
                let extraction = self.extractor().extract(descriptor, self.sink.as_ref()).await;
                self.persist(&extraction).await?;
                report.resources.push(resource_report(descriptor, extraction, None));
            }
        }

        self.persist_summary(&report).await?;
        self.log_outcome(&report);
        Ok(report)
    }

    /// Load previously written artifacts in tier order, without calling the proxy.
    #[instrument(skip(self, loader), fields(tenant = %self.config.tenant_id))]
    pub async fn load_from_artifacts<L: Loader + ?Sized>(&self, loader: &mut L) -> Result<RunReport> {
        let store = self
            .artifacts
            .clone()
            .unwrap_or_else(|| ArtifactStore::new(&self.config.output_dir));

        loader
            .begin_run(&self.catalog.tables())
            .await
            .map_err(SyncError::Prepare)?;

        let mut report = RunReport::default();
        for (tier, resources) in self.catalog.tiers() {
            let resources: Vec<_> = resources.into_iter().filter(|r| r.table.is_some()).collect();
            if resources.is_empty() {
                continue;
            }
            self.announce(tier, &resources);

            for descriptor in resources {
                let raw = match store.read_resource(descriptor.name).await {
                    Ok(records) => records,
                    Err(e) => {
                        let error = SyncError::from(e);
                        self.abort(loader, descriptor.name, &error.to_string()).await;
                        return Err(error);
                    }
                };
                let extraction = dedupe(descriptor, raw);

                let rows = match loader.load(descriptor, &extraction.records).await {
                    Ok(result) => result.inserted_or_updated_count,
                    Err(source) => {
                        self.abort(loader, descriptor.name, &source.to_string()).await;
                        return Err(SyncError::Load {
                            resource: descriptor.name.to_string(),
                            source,
                        });
                    }
                };
                self.sink.emit(ProgressEvent::ResourceLoaded {
                    resource: descriptor.name.to_string(),
                    rows,
                });
                report.resources.push(resource_report(descriptor, extraction, Some(rows)));
            }
        }

        loader.commit_run().await.map_err(SyncError::Commit)?;
        report.committed = true;
        self.sink.emit(ProgressEvent::RunCommitted {
            resources: report.resources.len(),
        });
        Ok(report)
    }

    /// One cheap call before any extraction; a failure aborts the run.
    async fn preflight(&self) -> Result<()> {
        let probe = ApiRequest::get(ApiPath::data(&self.config.tenant_id, PROBE_RESOURCE));
        self.gateway
            .call(&probe)
            .await
            .into_result()
            .map_err(SyncError::Preflight)?;
        self.sink.emit(ProgressEvent::PreflightPassed);
        Ok(())
    }

    fn extractor(&self) -> Extractor<'_, G> {
        let extractor = Extractor::new(&self.gateway, &self.config.tenant_id, &self.config.extraction);
        match self.now {
            Some(now) => extractor.at(now),
            None => extractor,
        }
    }

    fn announce(&self, tier: u8, resources: &[&ResourceDescriptor]) {
        self.sink.emit(ProgressEvent::TierStarted {
            tier,
            resources: resources.iter().map(|r| r.name.to_string()).collect(),
        });
    }

    async fn persist(&self, extraction: &Extraction) -> Result<()> {
        if let Some(store) = &self.artifacts {
            store
                .write_resource(extraction.resource, extraction.shape, &extraction.records)
                .await?;
        }
        Ok(())
    }

    async fn persist_summary(&self, report: &RunReport) -> Result<()> {
        if let Some(store) = &self.artifacts {
            let path = store
                .write_summary(&self.config.tenant_id, &report.counts())
                .await?;
            info!(path = %path.display(), "Wrote extraction summary");
        }
        Ok(())
    }

    /// Roll the run back after a failure on `resource`.
    async fn abort<L: Loader + ?Sized>(&self, loader: &mut L, resource: &str, error: &str) {
        if let Err(e) = loader.rollback_run().await {
            warn!(resource, error = %e, "Rollback failed");
        }
        self.sink.emit(ProgressEvent::RunRolledBack {
            resource: resource.to_string(),
            error: error.to_string(),
        });
    }

    fn log_outcome(&self, report: &RunReport) {
        let degraded = report.degraded();
        if degraded.is_empty() {
            info!(records = report.total_extracted(), "Sync finished");
        } else {
            warn!(
                records = report.total_extracted(),
                degraded = %degraded.join(", "),
                "Sync finished with partial datasets"
            );
        }
    }
}

/// Re-apply the ledger to records read back from disk.
fn dedupe(descriptor: &ResourceDescriptor, records: Vec<Record>) -> Extraction {
    let mut ledger = DedupLedger::new();
    let mut stats = ExtractStats::default();
    let mut unique = Vec::with_capacity(records.len());

    for record in records {
        match record.primary_key(descriptor.primary_key_field) {
            Some(key) if ledger.observe(&key) => unique.push(record),
            Some(_) => {}
            None => stats.missing_key += 1,
        }
    }
    stats.duplicates = ledger.duplicates();

    Extraction {
        resource: descriptor.name,
        shape: descriptor.shape,
        records: unique,
        stats,
    }
}

fn resource_report(descriptor: &ResourceDescriptor, extraction: Extraction, loaded: Option<u64>) -> ResourceReport {
    ResourceReport {
        name: descriptor.name.to_string(),
        tier: descriptor.tier,
        shape: descriptor.shape,
        extracted: extraction.records.len(),
        loaded,
        stats: extraction.stats,
    }
}
