//! JSON fixtures shaped like the API's records.
//!
//! The builders return `serde_json::Value` so tests can script
//! [`MockTransport`](fitsync_engine::MockTransport) replies and seed cache
//! entries with the same documents.

use fitsync_cache::{FilePersister, QueryKey};
use fitsync_engine::{ApiTransport, Synchronizer};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Author summary embedded in posts and comments.
pub fn user_summary(id: i64, username: &str) -> Value {
    json!({"id": id, "username": username, "avatar": null})
}

/// A full user profile.
pub fn user(id: i64, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "first_name": "",
        "last_name": "",
        "bio": "",
        "friends_count": 0,
        "current_program": null,
        "is_friend": false
    })
}

/// A post by user 1.
pub fn post(id: i64, content: &str) -> Value {
    post_by(id, 1, content)
}

/// A post by `author`.
pub fn post_by(id: i64, author: i64, content: &str) -> Value {
    json!({
        "id": id,
        "user": user_summary(author, "author"),
        "content": content,
        "likes_count": 0,
        "is_liked": false,
        "comments": [],
        "comments_count": 0,
        "shares_count": 0,
        "is_share": false
    })
}

/// A post with the given like state.
pub fn liked_post(id: i64, likes: u64, is_liked: bool) -> Value {
    let mut record = post(id, "leg day");
    record["likes_count"] = json!(likes);
    record["is_liked"] = json!(is_liked);
    record
}

/// A first page holding `results`.
pub fn page(results: Vec<Value>) -> Value {
    json!({"count": results.len(), "next": null, "previous": null, "results": results})
}

/// A program without workouts.
pub fn program(id: i64, name: &str, is_active: bool) -> Value {
    json!({"id": id, "name": name, "description": "", "is_active": is_active, "workouts": []})
}

/// A workout log.
pub fn workout_log(id: i64, name: &str) -> Value {
    json!({"id": id, "name": name, "exercises": [], "workout_partners": []})
}

/// An unread, unseen notification.
pub fn notification(id: i64, notification_type: &str, priority: &str) -> Value {
    json!({
        "id": id,
        "notification_type": notification_type,
        "priority": priority,
        "is_read": false,
        "is_seen": false,
        "message": ""
    })
}

/// Notification counts with everything unread and unseen.
pub fn notification_counts(by_type: &[(&str, u64)], by_priority: &[(&str, u64)]) -> Value {
    let unread: u64 = by_type.iter().map(|(_, n)| n).sum();
    let types: serde_json::Map<String, Value> = by_type
        .iter()
        .map(|(t, n)| ((*t).to_string(), json!(n)))
        .collect();
    let priorities: serde_json::Map<String, Value> = by_priority
        .iter()
        .map(|(p, n)| ((*p).to_string(), json!(n)))
        .collect();
    json!({
        "total": unread,
        "unread": unread,
        "unseen": unread,
        "by_type": types,
        "by_priority": priorities,
        "recent_24h": 0
    })
}

/// Stores `data` under `key` as if a read had fetched it.
pub fn seed<T: ApiTransport>(sync: &Synchronizer<T>, key: &QueryKey, data: Value) {
    let ticket = sync.cache().begin_fetch(key);
    assert!(sync.cache().complete_fetch(&ticket, data), "seed of {key} was cancelled");
}

/// A file persister in a fresh temporary directory.
pub struct TempPersister {
    /// The persister.
    pub persister: FilePersister,
    /// Kept alive so the directory outlives the persister.
    _dir: TempDir,
}

impl TempPersister {
    /// Creates the directory and the persister.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let persister = FilePersister::new(dir.path().join("cache.cbor"));
        Self {
            persister,
            _dir: dir,
        }
    }
}

impl Default for TempPersister {
    fn default() -> Self {
        Self::new()
    }
}
