//! The rule vocabulary.
//!
//! Every change a write makes to the cache is described as data: a list of
//! [`CacheRule`]s executed in order by [`QueryCache::apply_rules`].
//!
//! [`QueryCache::apply_rules`]: crate::QueryCache::apply_rules

use crate::key::{KeyPattern, QueryKey};
use crate::list::ListPosition;
use fitsync_protocol::EntityId;
use serde_json::Value;

/// One cache edit.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRule {
    /// Adds a record to every matching list. A record whose id is already
    /// listed is replaced in place instead.
    InsertIntoList {
        /// Lists to edit.
        pattern: KeyPattern,
        /// Record to add.
        record: Value,
        /// Where it goes.
        position: ListPosition,
    },

    /// Replaces a record in every matching list that holds it.
    ReplaceInList {
        /// Lists to edit.
        pattern: KeyPattern,
        /// Record id.
        id: EntityId,
        /// Replacement.
        record: Value,
    },

    /// Removes a record from every matching list that holds it.
    RemoveFromList {
        /// Lists to edit.
        pattern: KeyPattern,
        /// Record id.
        id: EntityId,
    },

    /// Writes a single document, creating the entry if absent.
    SetSingleton {
        /// Entry to write.
        key: QueryKey,
        /// New document.
        record: Value,
    },

    /// Marks matching entries for refetch.
    Invalidate {
        /// Entries to mark.
        pattern: KeyPattern,
    },

    /// Adds `delta` to an integer member of one entry, clamping at zero.
    /// A missing entry is left alone.
    AdjustCounter {
        /// Entry holding the counter.
        key: QueryKey,
        /// Member path inside the document.
        path: Vec<String>,
        /// Signed change.
        delta: i64,
    },
}

impl CacheRule {
    /// Inserts at the head of matching lists.
    pub fn prepend(pattern: KeyPattern, record: Value) -> Self {
        CacheRule::InsertIntoList {
            pattern,
            record,
            position: ListPosition::Head,
        }
    }

    /// Inserts at the tail of matching lists.
    pub fn append(pattern: KeyPattern, record: Value) -> Self {
        CacheRule::InsertIntoList {
            pattern,
            record,
            position: ListPosition::Tail,
        }
    }

    /// Replaces a record in matching lists.
    pub fn replace(pattern: KeyPattern, id: EntityId, record: Value) -> Self {
        CacheRule::ReplaceInList {
            pattern,
            id,
            record,
        }
    }

    /// Removes a record from matching lists.
    pub fn remove(pattern: KeyPattern, id: EntityId) -> Self {
        CacheRule::RemoveFromList { pattern, id }
    }

    /// Writes one document.
    pub fn set(key: QueryKey, record: Value) -> Self {
        CacheRule::SetSingleton { key, record }
    }

    /// Marks entries for refetch.
    pub fn invalidate(pattern: impl Into<KeyPattern>) -> Self {
        CacheRule::Invalidate {
            pattern: pattern.into(),
        }
    }

    /// Adjusts a counter.
    pub fn adjust(key: QueryKey, path: &[&str], delta: i64) -> Self {
        CacheRule::AdjustCounter {
            key,
            path: path.iter().map(|s| (*s).to_string()).collect(),
            delta,
        }
    }

    /// Every entry this rule can touch.
    pub fn scope(&self) -> KeyPattern {
        match self {
            CacheRule::InsertIntoList { pattern, .. }
            | CacheRule::ReplaceInList { pattern, .. }
            | CacheRule::RemoveFromList { pattern, .. }
            | CacheRule::Invalidate { pattern } => pattern.clone(),
            CacheRule::SetSingleton { key, .. } | CacheRule::AdjustCounter { key, .. } => {
                key.exact()
            }
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            CacheRule::InsertIntoList { .. } => "insert",
            CacheRule::ReplaceInList { .. } => "replace",
            CacheRule::RemoveFromList { .. } => "remove",
            CacheRule::SetSingleton { .. } => "set",
            CacheRule::Invalidate { .. } => "invalidate",
            CacheRule::AdjustCounter { .. } => "adjust",
        }
    }
}

/// The scopes of a rule list, without duplicates.
pub fn scopes(rules: &[CacheRule]) -> Vec<KeyPattern> {
    let mut out: Vec<KeyPattern> = Vec::new();
    for scope in rules.iter().map(CacheRule::scope) {
        if !out.contains(&scope) {
            out.push(scope);
        }
    }
    out
}
