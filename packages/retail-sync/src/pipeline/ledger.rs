use std::collections::HashSet;

/// Primary keys already emitted for one resource in one run.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<String>,
    duplicates: u64,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`. Returns false if it was already seen.
    pub fn observe(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            self.duplicates += 1;
            return false;
        }
        self.seen.insert(key.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Observations rejected as already seen.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}
