//! Model validation errors.

use crate::id::EntityId;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Invariant violations detected on the client before any I/O.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A post carries both a program and a workout log.
    #[error("post attaches both a program and a workout log")]
    AttachmentConflict,

    /// A superset link is missing its reverse link.
    #[error("exercise {exercise} pairs with {partner} but the link is not symmetric")]
    SupersetAsymmetric {
        /// Exercise holding the link.
        exercise: EntityId,
        /// Exercise it points at.
        partner: EntityId,
    },

    /// A superset link points outside the workout.
    #[error("exercise {exercise} pairs with {partner}, which is not in the workout")]
    SupersetPartnerMissing {
        /// Exercise holding the link.
        exercise: EntityId,
        /// Exercise it points at.
        partner: EntityId,
    },

    /// An exercise pairs with itself.
    #[error("exercise {0} cannot form a superset with itself")]
    SupersetSelf(EntityId),

    /// A set populates a field its effort type does not use, or misses one it needs.
    #[error("set {index} of exercise {exercise} does not match effort type {effort}")]
    SetFieldsMismatch {
        /// Exercise owning the set.
        exercise: EntityId,
        /// Position of the set.
        index: usize,
        /// Effort type tag.
        effort: &'static str,
    },

    /// A reorder request is not a permutation of the current items.
    #[error("reorder must list every existing item exactly once")]
    ReorderMismatch,

    /// A record was expected in the collection but is absent.
    #[error("record {0} not found")]
    RecordMissing(EntityId),

    /// A rating falls outside its scale.
    #[error("{field} must be between {min} and {max}, got {value}")]
    RatingOutOfRange {
        /// Rated field.
        field: &'static str,
        /// Lower bound.
        min: u8,
        /// Upper bound.
        max: u8,
        /// Offending value.
        value: u8,
    },

    /// An operation needs a persisted record but got a search result.
    #[error("gym has no local id")]
    MissingLocalId,

    /// The cached document did not have the expected shape.
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Malformed(err.to_string())
    }
}
