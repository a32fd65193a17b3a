//! Session state machine and synchronizer statistics.

use crate::error::{SyncError, SyncResult};
use std::time::Instant;

/// Where the synchronizer is in the login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session token is stored.
    Anonymous,
    /// A login call is in flight.
    Authenticating,
    /// A session token is stored.
    Authenticated,
    /// Logout is purging the cache and revoking the token.
    LoggingOut,
}

impl SessionState {
    /// Returns true if a session change is in progress.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, SessionState::Authenticating | SessionState::LoggingOut)
    }

    /// Returns true if `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Anonymous, Authenticating)
                | (Authenticated, Authenticating)
                | (Authenticating, Authenticated)
                | (Authenticating, Anonymous)
                | (Authenticated, LoggingOut)
                | (Anonymous, LoggingOut)
                | (LoggingOut, Anonymous)
        )
    }

    /// Checks a transition, naming both ends on failure.
    pub fn check_transition(&self, next: SessionState) -> SyncResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(SyncError::InvalidStateTransition {
                from: format!("{self:?}"),
                to: format!("{next:?}"),
            })
        }
    }
}

/// Statistics about synchronizer operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Reads requested.
    pub reads: u64,
    /// Reads served from the cache without a call.
    pub cache_hits: u64,
    /// Reads whose result was discarded because they were cancelled.
    pub reads_cancelled: u64,
    /// Writes issued.
    pub writes: u64,
    /// Writes whose speculative changes were rolled back.
    pub rollbacks: u64,
    /// Retries across reads and writes.
    pub retries: u64,
    /// Last successful call.
    pub last_success: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}
