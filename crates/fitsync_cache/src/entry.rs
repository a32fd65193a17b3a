//! Cache entries.

use std::time::{Duration, Instant};

/// One cached query result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The cached JSON document.
    pub data: serde_json::Value,
    /// When the data was last written.
    pub updated_at: Instant,
    /// Marked for refetch by an invalidation.
    pub invalidated: bool,
}

impl CacheEntry {
    /// Fresh entry written now.
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            updated_at: Instant::now(),
            invalidated: false,
        }
    }

    /// Time since the data was written.
    pub fn age(&self) -> Duration {
        self.updated_at.elapsed()
    }

    /// Returns true if the entry must be refetched before being served.
    pub fn is_stale(&self, stale_time: Duration) -> bool {
        self.invalidated || self.age() >= stale_time
    }

    /// Replaces the data and clears the invalidation mark.
    pub(crate) fn touch(&mut self, data: serde_json::Value) {
        self.data = data;
        self.updated_at = Instant::now();
        self.invalidated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn staleness() {
        let mut entry = CacheEntry::new(json!([]));
        assert!(!entry.is_stale(Duration::from_secs(60)));
        assert!(entry.is_stale(Duration::ZERO));
        entry.invalidated = true;
        assert!(entry.is_stale(Duration::from_secs(60)));
        entry.touch(json!([1]));
        assert!(!entry.invalidated);
    }
}
