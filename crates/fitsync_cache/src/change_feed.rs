//! Change feed for observing cache edits.
//!
//! The cache emits one event per entry changed by a rule set, a restore or a
//! purge, after the edit is visible. Events carry the key only; subscribers
//! read the data back through the cache.

use crate::key::QueryKey;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheChange {
    /// Data was written or edited.
    Updated,
    /// The entry was marked for refetch.
    Invalidated,
    /// The entry was removed.
    Removed,
}

/// A single change event.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    /// Position in the cache's edit order.
    pub sequence: u64,
    /// Changed entry.
    pub key: QueryKey,
    /// Kind of change.
    pub change: CacheChange,
}

/// Distributes cache events to subscribers and keeps a bounded history.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<CacheEvent>>>,
    history: RwLock<Vec<CacheEvent>>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a change feed keeping at most `max_history` events.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
        }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> Receiver<CacheEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits events in order. Disconnected subscribers are dropped.
    pub fn emit_batch(&self, events: Vec<CacheEvent>) {
        if events.is_empty() {
            return;
        }
        {
            let mut history = self.history.write();
            history.extend(events.iter().cloned());
            if history.len() > self.max_history {
                let excess = history.len() - self.max_history;
                history.drain(0..excess);
            }
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| events.iter().all(|e| tx.send(e.clone()).is_ok()));
    }

    /// Events with sequence greater than `cursor`, up to `limit`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<CacheEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Latest sequence in history, 0 if none.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map_or(0, |e| e.sequence)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::with_max_history(1024)
    }
}
