//! Structured progress reporting.
//!
//! The pipeline never prints. It emits [`ProgressEvent`]s into a
//! [`ProgressSink`]; rendering is the sink's business.

use tracing::{info, warn};

use crate::types::report::ExtractStats;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    PreflightPassed,
    TierStarted {
        tier: u8,
        resources: Vec<String>,
    },
    WindowCompleted {
        resource: String,
        window: String,
        fetched: usize,
        failed: bool,
    },
    ResourceExtracted {
        resource: String,
        records: usize,
        stats: ExtractStats,
    },
    /// A soft failure cut extraction short; the dataset may be partial.
    ExtractionDegraded {
        resource: String,
        reason: String,
    },
    /// The server's count disagrees with what was extracted.
    CountDrift {
        resource: String,
        expected: u64,
        extracted: usize,
    },
    ResourceLoaded {
        resource: String,
        rows: u64,
    },
    RunCommitted {
        resources: usize,
    },
    RunRolledBack {
        resource: String,
        error: String,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Renders progress events as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PreflightPassed => info!("Pre-flight probe succeeded"),
            ProgressEvent::TierStarted { tier, resources } => {
                info!(tier, resources = %resources.join(", "), "Starting tier")
            }
            ProgressEvent::WindowCompleted {
                resource,
                window,
                fetched,
                failed,
            } => {
                if failed {
                    warn!(resource = %resource, window = %window, fetched, "Window ended early on failure");
                } else {
                    info!(resource = %resource, window = %window, fetched, "Window complete");
                }
            }
            ProgressEvent::ResourceExtracted {
                resource,
                records,
                stats,
            } => info!(
                resource = %resource,
                records,
                calls = stats.calls,
                pages = stats.pages,
                duplicates = stats.duplicates,
                skipped = stats.missing_key + stats.malformed,
                "Extracted resource"
            ),
            ProgressEvent::ExtractionDegraded { resource, reason } => {
                warn!(resource = %resource, reason = %reason, "Extraction degraded to a partial dataset")
            }
            ProgressEvent::CountDrift {
                resource,
                expected,
                extracted,
            } => warn!(resource = %resource, expected, extracted, "Extracted fewer records than the server reports"),
            ProgressEvent::ResourceLoaded { resource, rows } => {
                info!(resource = %resource, rows, "Loaded resource")
            }
            ProgressEvent::RunCommitted { resources } => {
                info!(resources, "Load run committed")
            }
            ProgressEvent::RunRolledBack { resource, error } => {
                warn!(resource = %resource, error = %error, "Load run rolled back")
            }
        }
    }
}
