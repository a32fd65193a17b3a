//! Users, profiles and friend requests.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// Compact author/participant reference embedded in other records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User id.
    pub id: EntityId,
    /// Handle.
    #[serde(default)]
    pub username: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Reference to a user's active program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRef {
    /// Program id.
    pub id: EntityId,
    /// Program name.
    #[serde(default)]
    pub name: String,
}

/// A full user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: EntityId,
    /// Handle.
    pub username: String,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Profile text.
    #[serde(default)]
    pub bio: String,
    /// Self-reported level.
    #[serde(default)]
    pub fitness_level: Option<String>,
    /// Number of friends.
    #[serde(default)]
    pub friends_count: u64,
    /// The one active program, if any.
    #[serde(default)]
    pub current_program: Option<ProgramRef>,
    /// Whether the viewer is friends with this user.
    #[serde(default)]
    pub is_friend: bool,
    /// Pending request state between viewer and this user.
    #[serde(default)]
    pub friend_request_status: Option<String>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    /// Compact reference to this user.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// New family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// New profile text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// New level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness_level: Option<String>,
}

/// State of a friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    /// Awaiting a response.
    Pending,
    /// Accepted; both users are now friends.
    Accepted,
    /// Rejected.
    Rejected,
}

/// A friend request between two users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    /// Request id.
    pub id: EntityId,
    /// Sender.
    pub from_user: UserSummary,
    /// Recipient.
    pub to_user: UserSummary,
    /// Current state.
    pub status: FriendRequestStatus,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Username/password pair posted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    /// Handle or e-mail.
    pub username: String,
    /// Secret.
    pub password: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body returned by the login endpoint.
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
    /// Opaque session token.
    pub token: String,
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"<redacted>")
            .finish()
    }
}
