//! Group workouts.

use super::user::UserSummary;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// Lifecycle of a group workout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupWorkoutStatus {
    /// Upcoming.
    #[default]
    Scheduled,
    /// Happening now.
    Active,
    /// Finished.
    Completed,
    /// Called off by the creator.
    Cancelled,
}

/// A scheduled shared session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupWorkout {
    /// Group workout id.
    pub id: EntityId,
    /// Title.
    pub title: String,
    /// Organiser.
    #[serde(default)]
    pub creator: Option<UserSummary>,
    /// Start timestamp.
    #[serde(default)]
    pub scheduled_time: Option<String>,
    /// Gym it takes place at.
    #[serde(default)]
    pub gym: Option<EntityId>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: GroupWorkoutStatus,
    /// Joined users.
    #[serde(default)]
    pub participants: Vec<UserSummary>,
    /// Number of participants.
    #[serde(default)]
    pub participants_count: u64,
    /// Capacity.
    #[serde(default)]
    pub max_participants: Option<u64>,
    /// Whether the viewer has joined.
    #[serde(default)]
    pub is_participant: bool,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Payload for scheduling a group workout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewGroupWorkout {
    /// Title.
    pub title: String,
    /// Start timestamp.
    pub scheduled_time: String,
    /// Gym.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gym: Option<EntityId>,
    /// Capacity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u64>,
}

/// A chat message inside a group workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessage {
    /// Message id.
    pub id: EntityId,
    /// Author.
    pub user: UserSummary,
    /// Text.
    pub content: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// State of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    /// Awaiting the organiser.
    Pending,
    /// Let in.
    Approved,
    /// Turned down.
    Rejected,
}

/// A request to join a capped or private group workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Request id.
    pub id: EntityId,
    /// Requesting user.
    pub user: UserSummary,
    /// Current state.
    pub status: JoinRequestStatus,
}
