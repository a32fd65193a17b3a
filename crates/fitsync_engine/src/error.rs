//! Error types for the synchronizer.

use fitsync_cache::CacheError;
use fitsync_protocol::{classify_status, ModelError, StatusClass};
use thiserror::Error;

/// Result type for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by reads, writes and session changes.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The operation needs a session and none is stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The server rejected the session or the credentials (401).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The session may not perform this operation (403).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The resource does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the payload (400, 422 and other 4xx).
    #[error("validation failed ({status}): {message}")]
    Validation {
        /// HTTP status.
        status: u16,
        /// Server message.
        message: String,
    },

    /// The server failed (5xx, 429).
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Server message.
        message: String,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The request timed out.
    #[error("operation timed out")]
    Timeout,

    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last: Box<SyncError>,
    },

    /// The read was superseded by a write, purge or login before it landed.
    #[error("read cancelled")]
    Cancelled,

    /// The response did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Cache error.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The change violates a model invariant; nothing was sent.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Invalid session state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Maps a non-success HTTP status to its error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthenticationFailed(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            408 => Self::Timeout,
            _ => match classify_status(status) {
                StatusClass::Transient => Self::Server { status, message },
                _ => Self::Validation { status, message },
            },
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Server { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the server no longer accepts the session.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            SyncError::NotAuthenticated | SyncError::AuthenticationFailed(_) => true,
            SyncError::RetriesExhausted { last, .. } => last.is_auth_failure(),
            _ => false,
        }
    }
}
