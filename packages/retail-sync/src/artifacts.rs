//! On-disk extraction artifacts: one JSON document per resource plus a
//! run summary.

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ArtifactError;
use crate::types::record::Record;
use crate::types::resource::Shape;

pub const SUMMARY_FILE: &str = "_extraction_summary.json";

/// Directory holding one `{resource}.json` per extracted resource.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    extraction_timestamp: String,
    company_id: &'a str,
    counts: &'a IndexMap<String, usize>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, resource: &str) -> PathBuf {
        self.dir.join(format!("{}.json", resource))
    }

    /// Write a resource's records: an array, or the lone object for singletons.
    pub async fn write_resource(
        &self,
        resource: &str,
        shape: Shape,
        records: &[Record],
    ) -> Result<PathBuf, ArtifactError> {
        let document = match (shape, records) {
            (Shape::Singleton, [record]) => Value::from(record.clone()),
            (Shape::Singleton, []) => Value::Object(Default::default()),
            _ => Value::Array(records.iter().cloned().map(Value::from).collect()),
        };
        let path = self.path_for(resource);
        self.write_json(&path, &document).await?;
        debug!(resource, records = records.len(), path = %path.display(), "Wrote artifact");
        Ok(path)
    }

    /// Write `_extraction_summary.json`.
    pub async fn write_summary(
        &self,
        company_id: &str,
        counts: &IndexMap<String, usize>,
    ) -> Result<PathBuf, ArtifactError> {
        let summary = Summary {
            extraction_timestamp: Utc::now().format("%Y%m%d_%H%M%S").to_string(),
            company_id,
            counts,
        };
        let path = self.dir.join(SUMMARY_FILE);
        self.write_json(&path, &summary).await?;
        Ok(path)
    }

    /// Read a resource artifact back as records. A missing file is an empty set.
    pub async fn read_resource(&self, resource: &str) -> Result<Vec<Record>, ArtifactError> {
        let path = self.path_for(resource);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(resource, path = %path.display(), "No artifact found; treating as empty");
                return Ok(Vec::new());
            }
            Err(source) => return Err(ArtifactError::Io { path, source }),
        };

        let document: Value = serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
            path: path.clone(),
            source,
        })?;
        let items = match document {
            Value::Array(items) => items,
            Value::Object(map) if map.is_empty() => Vec::new(),
            other => vec![other],
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<Record>(item) {
                Ok(record) => records.push(record),
                Err(e) => warn!(resource, error = %e, "Skipping unreadable artifact item"),
            }
        }
        Ok(records)
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), ArtifactError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ArtifactError::Io {
                path: self.dir.clone(),
                source,
            })?;
        let body = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tokio::fs::write(path, body)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}
