//! Pre-write snapshots for optimistic rollback.

use crate::entry::CacheEntry;
use crate::key::{KeyPattern, QueryKey};

/// The captured state of every entry in a scope.
///
/// Restoring it through [`QueryCache::restore`](crate::QueryCache::restore)
/// puts the scope back exactly as it was, including entries that did not
/// exist yet.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    scope: Vec<KeyPattern>,
    entries: Vec<(QueryKey, Option<CacheEntry>)>,
}

impl CacheSnapshot {
    pub(crate) fn new(scope: Vec<KeyPattern>, entries: Vec<(QueryKey, Option<CacheEntry>)>) -> Self {
        Self { scope, entries }
    }

    /// Patterns the snapshot covers.
    pub fn scope(&self) -> &[KeyPattern] {
        &self.scope
    }

    /// Number of captured keys, present or absent.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Captured state of a key: `Some(None)` if it was recorded as absent.
    pub fn captured(&self, key: &QueryKey) -> Option<Option<&CacheEntry>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, e)| e.as_ref())
    }

    pub(crate) fn into_parts(self) -> (Vec<KeyPattern>, Vec<(QueryKey, Option<CacheEntry>)>) {
        (self.scope, self.entries)
    }
}
