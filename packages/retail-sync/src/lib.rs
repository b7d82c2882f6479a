//! Retail Backend Sync Library
//!
//! Pulls master and transactional records for one tenant out of a retail
//! backend that is only reachable through an HTTP proxy, and loads them
//! idempotently into Postgres.
//!
//! # Guarantees
//!
//! - Every extracted resource is duplicate-free (per-resource ledger)
//! - Offset pagination always terminates on an empty or short page
//! - Large searchable resources are split into calendar-month windows to stay
//!   under the server's result cap
//! - A load run is one transaction: all tiers commit or none do
//! - Replaying a load only advances the declared mutable columns
//!
//! # Usage
//!
//! ```rust,ignore
//! use retail_sync::{Catalog, MemoryLoader, Orchestrator, SyncConfig, TracingSink};
//! use std::sync::Arc;
//!
//! let config = SyncConfig::from_env()?;
//! let gateway = proxy_client::ProxyClient::new(config.proxy()?)?;
//! let mut loader = MemoryLoader::new(&config.tenant_id);
//!
//! let orchestrator = Orchestrator::new(config, Catalog::standard(), gateway, Arc::new(TracingSink));
//! let report = orchestrator.run(&mut loader).await?;
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - Resource descriptors and target tables
//! - [`pipeline`] - Pagination, deduplication, extraction and orchestration
//! - [`stores`] - Load targets (MemoryLoader, PostgresLoader)
//! - [`artifacts`] - JSON artifacts written per resource
//! - [`traits`] - Loader and progress sink abstractions
//! - [`types`] - Records, windows, tables, configuration and reports
//! - [`testing`] - Mock gateway and recording sink

pub mod artifacts;
pub mod catalog;
pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use artifacts::ArtifactStore;
pub use catalog::Catalog;
pub use error::{ArtifactError, CatalogError, LoadError, LoaderResult, Result, SyncError};
pub use traits::{
    loader::Loader,
    sink::{ProgressEvent, ProgressSink, TracingSink},
};
pub use types::{
    config::{ExtractionConfig, LoadConfig, ReferencePolicy, SyncConfig},
    record::{Record, RecordId},
    report::{ExtractStats, LoadResult, ResourceReport, RunReport},
    resource::{Endpoint, ResourceDescriptor, Shape},
    table::{ColumnDefault, ColumnKind, ColumnSpec, ForeignRef, Row, SqlValue, TableSpec},
    window::{month_windows, TimeWindow},
};

// Re-export pipeline components
pub use pipeline::{
    CursorRun, DedupLedger, Extraction, Extractor, OffsetCursor, Orchestrator, PageSource,
    RetryPolicy, StopReason, TimePartitioned,
};

// Re-export stores
pub use stores::{MemoryLoader, PostgresLoader};

// Re-export testing utilities
pub use testing::{MockGateway, RecordingSink};
