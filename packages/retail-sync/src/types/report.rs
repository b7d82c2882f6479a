use indexmap::IndexMap;
use serde::Serialize;

use super::resource::Shape;

/// Counters collected while extracting one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    /// Gateway calls issued, retries and the count call included
    pub calls: u32,
    /// Successful pages
    pub pages: u32,
    /// Month windows processed (searchable resources only)
    pub windows: u32,
    /// Items dropped because their key was already seen
    pub duplicates: u64,
    /// Items dropped because they had no usable primary key
    pub missing_key: u64,
    /// Items dropped because they were not records
    pub malformed: u64,
    /// Pages or windows cut short by a soft failure
    pub failures: u32,
    /// Server-reported record count, when asked
    pub expected_total: Option<u64>,
}

impl ExtractStats {
    pub fn is_degraded(&self) -> bool {
        self.failures > 0
    }
}

/// Rows written for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    pub resource: String,
    pub inserted_or_updated_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub name: String,
    pub tier: u8,
    pub shape: Shape,
    pub extracted: usize,
    /// `None` for extract-only resources and extract-only runs
    pub loaded: Option<u64>,
    pub stats: ExtractStats,
}

/// Outcome of a whole run, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub resources: Vec<ResourceReport>,
    pub committed: bool,
}

impl RunReport {
    pub fn resource(&self, name: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resource name to extracted record count, in processing order.
    pub fn counts(&self) -> IndexMap<String, usize> {
        self.resources
            .iter()
            .map(|r| (r.name.clone(), r.extracted))
            .collect()
    }

    pub fn total_extracted(&self) -> usize {
        self.resources.iter().map(|r| r.extracted).sum()
    }

    pub fn degraded(&self) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|r| r.stats.is_degraded())
            .map(|r| r.name.as_str())
            .collect()
    }
}
