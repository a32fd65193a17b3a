//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache counters. All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches_stored: AtomicU64,
    fetches_discarded: AtomicU64,
    rules_applied: AtomicU64,
    snapshots: AtomicU64,
    rollbacks: AtomicU64,
    invalidations: AtomicU64,
    purges: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self, stored: bool) {
        if stored {
            self.fetches_stored.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fetches_discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_rules(&self, count: usize) {
        self.rules_applied.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidations(&self, count: usize) {
        self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_purge(&self) {
        self.purges.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches_stored: self.fetches_stored.load(Ordering::Relaxed),
            fetches_discarded: self.fetches_discarded.load(Ordering::Relaxed),
            rules_applied: self.rules_applied.load(Ordering::Relaxed),
            snapshots: self.snapshots.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    /// Reads served from the cache.
    pub hits: u64,
    /// Reads that needed a fetch.
    pub misses: u64,
    /// Fetch results written to the cache.
    pub fetches_stored: u64,
    /// Fetch results dropped because the fetch was cancelled.
    pub fetches_discarded: u64,
    /// Rules executed.
    pub rules_applied: u64,
    /// Snapshots taken.
    pub snapshots: u64,
    /// Snapshots restored.
    pub rollbacks: u64,
    /// Entries marked for refetch.
    pub invalidations: u64,
    /// Purge operations.
    pub purges: u64,
}
