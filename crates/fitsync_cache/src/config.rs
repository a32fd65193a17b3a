//! Cache configuration.

use std::time::Duration;

/// Configuration for a [`QueryCache`](crate::QueryCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long fetched data is served without refetching, unless a read
    /// asks for its own stale time.
    pub default_stale_time: Duration,

    /// Number of change events kept for polling.
    pub max_history: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_stale_time: Duration::from_secs(60),
            max_history: 1024,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default stale time.
    #[must_use]
    pub const fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.default_stale_time = stale_time;
        self
    }

    /// Sets the change-event history size.
    #[must_use]
    pub const fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }
}
