//! Server-assigned identifiers.

use fitsync_codec::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque identifier assigned by the remote API.
///
/// Some resources use integer keys and others use strings (notification
/// UUIDs, external place ids). The client never mints ids of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Integer primary key.
    Int(i64),
    /// String key.
    Str(String),
}

impl EntityId {
    /// Returns true if `json` is this id as the API renders it.
    pub fn matches_json(&self, json: &serde_json::Value) -> bool {
        match (self, json) {
            (EntityId::Int(n), serde_json::Value::Number(m)) => m.as_i64() == Some(*n),
            (EntityId::Str(s), serde_json::Value::String(t)) => s == t,
            _ => false,
        }
    }

    /// Reads the `id` member of a JSON record.
    pub fn of_record(record: &serde_json::Value) -> Option<Self> {
        Self::from_json(record.get("id")?)
    }

    /// Parses an id from its JSON rendering.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Number(n) => n.as_i64().map(EntityId::Int),
            serde_json::Value::String(s) => Some(EntityId::Str(s.clone())),
            _ => None,
        }
    }

    /// Renders the id as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            EntityId::Int(n) => serde_json::Value::from(*n),
            EntityId::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }

    /// Renders the id as a key part.
    pub fn to_key_part(&self) -> Value {
        match self {
            EntityId::Int(n) => Value::Integer(*n),
            EntityId::Str(s) => Value::text(s.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(n) => write!(f, "{n}"),
            EntityId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Int(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Str(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Str(s)
    }
}
