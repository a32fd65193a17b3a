//! Notifications and their aggregate counts.

use super::user::UserSummary;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A notification delivered to the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id.
    pub id: EntityId,
    /// Type tag (`like`, `comment`, `friend_request`, ...).
    pub notification_type: String,
    /// Priority tag (`low`, `normal`, `high`, ...).
    #[serde(default = "default_priority")]
    pub priority: String,
    /// Whether the user opened it.
    #[serde(default)]
    pub is_read: bool,
    /// Whether the user has seen it in a list.
    #[serde(default)]
    pub is_seen: bool,
    /// Triggering user.
    #[serde(default)]
    pub sender: Option<UserSummary>,
    /// Rendered text.
    #[serde(default)]
    pub message: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_priority() -> String {
    "normal".to_string()
}

/// Server-computed aggregate over the user's notifications.
///
/// `by_type` and `by_priority` count unread notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCounts {
    /// All notifications.
    #[serde(default)]
    pub total: u64,
    /// Unread notifications.
    #[serde(default)]
    pub unread: u64,
    /// Unseen notifications.
    #[serde(default)]
    pub unseen: u64,
    /// Unread notifications per type tag.
    #[serde(default)]
    pub by_type: BTreeMap<String, u64>,
    /// Unread notifications per priority tag.
    #[serde(default)]
    pub by_priority: BTreeMap<String, u64>,
    /// Notifications created in the last 24 hours.
    #[serde(default)]
    pub recent_24h: u64,
}

/// JSON member names of [`NotificationCounts`], for counter rules.
pub mod counts_field {
    /// `total`
    pub const TOTAL: &str = "total";
    /// `unread`
    pub const UNREAD: &str = "unread";
    /// `unseen`
    pub const UNSEEN: &str = "unseen";
    /// `by_type`
    pub const BY_TYPE: &str = "by_type";
    /// `by_priority`
    pub const BY_PRIORITY: &str = "by_priority";
}
