//! Error types for the query cache.

use std::io;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
///
/// Rules never fail: a rule whose target is missing or has an unexpected
/// shape is a no-op. Errors come from key construction and persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Canonical codec error.
    #[error("codec error: {0}")]
    Codec(#[from] fitsync_codec::CodecError),

    /// JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A filter did not serialize to a map or scalar.
    #[error("invalid key part: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// A persisted cache image is malformed.
    #[error("corrupt cache image: {message}")]
    CorruptImage {
        /// Description of the corruption.
        message: String,
    },

    /// A persisted cache image has an unknown version.
    #[error("unsupported cache image version {0}")]
    UnsupportedVersion(i64),
}

impl CacheError {
    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a corrupt image error.
    pub fn corrupt_image(message: impl Into<String>) -> Self {
        Self::CorruptImage {
            message: message.into(),
        }
    }
}
