//! Typed errors for the sync library.
//!
//! Extraction never produces an error: gateway failures degrade into partial
//! datasets and are reported through stats. Everything here is either a
//! pre-flight abort, a catalog defect, an artifact I/O failure, or a
//! persistence failure that rolls the whole run back.

use proxy_client::SoftFailure;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The probe call failed before any extraction started
    #[error("pre-flight probe failed: {0}")]
    Preflight(SoftFailure),

    /// Opening the run transaction or preparing the schema failed
    #[error("failed to prepare load run: {0}")]
    Prepare(#[source] LoadError),

    /// A resource could not be persisted; the run was rolled back
    #[error("failed to load {resource}: {source}")]
    Load {
        resource: String,
        #[source]
        source: LoadError,
    },

    /// The final commit failed; nothing from the run was persisted
    #[error("failed to commit load run: {0}")]
    Commit(#[source] LoadError),

    /// The resource catalog is inconsistent
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),

    /// Writing or reading an artifact failed
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Errors raised by a [`crate::Loader`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record field cannot be stored in its declared column kind
    #[error("{resource} record {record_id}: column {column} expects {expected}, found {found}")]
    Coercion {
        resource: String,
        record_id: String,
        column: String,
        expected: &'static str,
        found: String,
    },

    /// A batch references rows that were never loaded
    #[error("{resource}.{column} references {} missing {referenced} row(s): {}", .missing.len(), preview(.missing))]
    DanglingReference {
        resource: String,
        column: String,
        referenced: String,
        missing: Vec<String>,
    },

    /// A record reached the loader without a primary key
    #[error("{resource} record has no primary key {field}")]
    MissingPrimaryKey { resource: String, field: String },

    /// The resource is extract-only
    #[error("resource {resource} has no target table")]
    NoTable { resource: String },

    /// `load`/`commit_run` called outside of `begin_run`
    #[error("no load run is active")]
    NoActiveRun,

    /// `begin_run` called while a run is already open
    #[error("a load run is already in progress")]
    RunInProgress,
}

/// Inconsistencies in the resource catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two resources share a name
    #[error("duplicate resource: {name}")]
    DuplicateResource { name: String },

    /// A foreign reference points at a resource in the same or a later tier
    #[error("{resource}.{column} references {referenced} (tier {referenced_tier}), which does not load before tier {tier}")]
    ReferenceOrder {
        resource: String,
        column: String,
        referenced: String,
        tier: u8,
        referenced_tier: u8,
    },

    /// A foreign reference points at a resource that is absent or has no table
    #[error("{resource}.{column} references unknown table resource {referenced}")]
    UnknownReference {
        resource: String,
        column: String,
        referenced: String,
    },

    /// A `--only` filter named a resource that is not in the catalog
    #[error("unknown resource: {name}")]
    UnknownResource { name: String },
}

/// Failures reading or writing extraction artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;
pub type LoaderResult<T> = std::result::Result<T, LoadError>;

fn preview(ids: &[String]) -> String {
    const SHOWN: usize = 5;
    let mut out = ids.iter().take(SHOWN).cloned().collect::<Vec<_>>().join(", ");
    if ids.len() > SHOWN {
        out.push_str(", ...");
    }
    out
}
