//! Extraction engine: one resource in, one duplicate-free record set out.
//!
//! Chooses the pagination strategy from the resource's endpoint kind and
//! passes every item through a [`DedupLedger`], whatever the strategy.
//! Extraction never fails outright; gateway failures shrink the result and
//! are reported through [`ExtractStats`] and the progress sink.

use chrono::{DateTime, Utc};
use proxy_client::{ApiPath, ApiRequest, Gateway};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::ledger::DedupLedger;
use super::pagination::{
    call_with_retry, CursorRun, OffsetCursor, PageSource, StopReason, TimePartitioned,
};
use crate::traits::sink::{ProgressEvent, ProgressSink};
use crate::types::config::ExtractionConfig;
use crate::types::record::Record;
use crate::types::report::ExtractStats;
use crate::types::resource::{Endpoint, ResourceDescriptor, Shape};

/// The final record set of one resource.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub resource: &'static str,
    pub shape: Shape,
    /// First-seen order, no duplicate primary keys
    pub records: Vec<Record>,
    pub stats: ExtractStats,
}

pub struct Extractor<'a, G: Gateway + ?Sized> {
    gateway: &'a G,
    tenant: &'a str,
    config: &'a ExtractionConfig,
    now: DateTime<Utc>,
}

impl<'a, G: Gateway + ?Sized> Extractor<'a, G> {
    pub fn new(gateway: &'a G, tenant: &'a str, config: &'a ExtractionConfig) -> Self {
        Self {
            gateway,
            tenant,
            config,
            now: Utc::now(),
        }
    }

    /// Pin "now", the end of the last search window.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    #[instrument(skip(self, descriptor, sink), fields(resource = descriptor.name, endpoint = descriptor.endpoint.kind()))]
    pub async fn extract(&self, descriptor: &ResourceDescriptor, sink: &dyn ProgressSink) -> Extraction {
        let mut collector = Collector::new(descriptor);

        match descriptor.endpoint {
            Endpoint::Simple { path } => self.simple(path, &mut collector, sink).await,
            Endpoint::Paginated { path } => self.paginated(path, &mut collector, sink).await,
            Endpoint::Searchable { path } => self.searchable(path, &mut collector, sink).await,
        }

        let extraction = collector.finish();
        if let Some(expected) = extraction.stats.expected_total {
            if (extraction.records.len() as u64) < expected {
                sink.emit(ProgressEvent::CountDrift {
                    resource: descriptor.name.to_string(),
                    expected,
                    extracted: extraction.records.len(),
                });
            }
        }
        sink.emit(ProgressEvent::ResourceExtracted {
            resource: descriptor.name.to_string(),
            records: extraction.records.len(),
            stats: extraction.stats.clone(),
        });
        extraction
    }

    async fn simple(&self, path: &str, collector: &mut Collector<'_>, sink: &dyn ProgressSink) {
        let request = ApiRequest::get(ApiPath::data(self.tenant, path));
        let result = call_with_retry(
            self.gateway,
            &request,
            &self.config.retry,
            &mut collector.stats.calls,
        )
        .await;

        match result {
            Ok(envelope) => {
                collector.stats.pages += 1;
                for item in envelope.into_items() {
                    collector.push(item);
                }
            }
            Err(failure) => collector.degrade(sink, failure.to_string()),
        }
    }

    async fn paginated(&self, path: &str, collector: &mut Collector<'_>, sink: &dyn ProgressSink) {
        // Best effort; only used to flag drift
        let count = ApiRequest::get(ApiPath::count(self.tenant, path));
        collector.stats.calls += 1;
        match self.gateway.call(&count).await.into_result() {
            Ok(envelope) => collector.stats.expected_total = envelope.count(),
            Err(failure) => debug!(reason = %failure, "Count unavailable"),
        }

        let cursor = OffsetCursor::from_config(self.config);
        let run = cursor
            .run(
                self.gateway,
                PageSource::Data {
                    tenant: self.tenant,
                    path,
                },
            )
            .await;
        collector.absorb(run, sink);
    }

    async fn searchable(&self, path: &str, collector: &mut Collector<'_>, sink: &dyn ProgressSink) {
        let Some(start) = self.config.search_start_at() else {
            collector.degrade(sink, format!("search start {} has no local midnight", self.config.search_start));
            return;
        };

        let strategy = TimePartitioned::new(start, OffsetCursor::from_config(self.config))
            .with_window_delay(self.config.window_delay);

        let windows = strategy
            .run(self.gateway, self.tenant, path, self.now, |window, run| {
                let fetched = run.items.len();
                let failed = run.stop.is_failure();
                collector.absorb(run, sink);
                sink.emit(ProgressEvent::WindowCompleted {
                    resource: collector.descriptor.name.to_string(),
                    window: window.label(),
                    fetched,
                    failed,
                });
            })
            .await;
        collector.stats.windows = windows;
    }
}

/// Turns payload items into unique records.
struct Collector<'d> {
    descriptor: &'d ResourceDescriptor,
    ledger: DedupLedger,
    records: Vec<Record>,
    stats: ExtractStats,
    position: usize,
}

impl<'d> Collector<'d> {
    fn new(descriptor: &'d ResourceDescriptor) -> Self {
        Self {
            descriptor,
            ledger: DedupLedger::new(),
            records: Vec::new(),
            stats: ExtractStats::default(),
            position: 0,
        }
    }

    fn push(&mut self, item: Value) {
        let index = self.position;
        self.position += 1;

        let record = match self.descriptor.scalar_id_prefix {
            Some(prefix) if !item.is_object() => Record::from_scalar(prefix, index, &item),
            _ => serde_json::from_value::<Record>(item).ok(),
        };
        let Some(record) = record else {
            self.stats.malformed += 1;
            debug!(index, "Skipping item that is not a record");
            return;
        };
        let Some(key) = record.primary_key(self.descriptor.primary_key_field) else {
            self.stats.missing_key += 1;
            debug!(index, field = self.descriptor.primary_key_field, "Skipping record without primary key");
            return;
        };
        if self.ledger.observe(&key) {
            self.records.push(record);
        }
    }

    fn absorb(&mut self, run: CursorRun, sink: &dyn ProgressSink) {
        self.stats.calls += run.calls;
        self.stats.pages += run.pages;
        if let StopReason::Failed(failure) = &run.stop {
            self.degrade(sink, failure.to_string());
        }
        for item in run.items {
            self.push(item);
        }
    }

    fn degrade(&mut self, sink: &dyn ProgressSink, reason: String) {
        self.stats.failures += 1;
        sink.emit(ProgressEvent::ExtractionDegraded {
            resource: self.descriptor.name.to_string(),
            reason,
        });
    }

    fn finish(mut self) -> Extraction {
        self.stats.duplicates = self.ledger.duplicates();
        let skipped = self.stats.missing_key + self.stats.malformed;
        if skipped > 0 {
            warn!(
                resource = self.descriptor.name,
                missing_key = self.stats.missing_key,
                malformed = self.stats.malformed,
                "Skipped unusable items"
            );
        }
        Extraction {
            resource: self.descriptor.name,
            shape: self.descriptor.shape,
            records: self.records,
            stats: self.stats,
        }
    }
}
