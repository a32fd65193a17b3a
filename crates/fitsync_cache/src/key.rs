//! Cache key namespace.
//!
//! A [`QueryKey`] is an entity root followed by ordered parts. Parts are
//! canonical values, so a filter struct serialized with its fields in any
//! order produces the same key, the same hash and the same encoding.
//!
//! ```text
//! posts                         all post data
//! posts/feed/{"scope":"friends"} one filtered feed
//! posts/detail/42               one post
//! posts/detail/42/comments      a sub-resource of that post
//! ```

use crate::error::{CacheError, CacheResult};
use fitsync_codec::{to_canonical_cbor, Value};
use fitsync_protocol::{EntityId, EntityKind};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Segment for single-record keys.
pub const DETAIL: &str = "detail";

/// Segment for list keys.
pub const LIST: &str = "list";

/// Semantic identity of one cached query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    root: EntityKind,
    parts: Vec<Value>,
}

impl QueryKey {
    /// Key covering every record of an entity type.
    pub fn root(kind: EntityKind) -> Self {
        Self {
            root: kind,
            parts: Vec::new(),
        }
    }

    /// `root/detail/id`.
    pub fn detail(kind: EntityKind, id: &EntityId) -> Self {
        Self::root(kind).segment(DETAIL).id(id)
    }

    /// Appends a text segment.
    #[must_use]
    pub fn segment(mut self, name: &str) -> Self {
        self.parts.push(Value::text(name));
        self
    }

    /// Appends a record id.
    #[must_use]
    pub fn id(mut self, id: &EntityId) -> Self {
        self.parts.push(id.to_key_part());
        self
    }

    /// Appends an already-canonical part.
    #[must_use]
    pub fn part(mut self, part: Value) -> Self {
        self.parts.push(part);
        self
    }

    /// Appends a filter.
    ///
    /// The filter is serialized through serde and canonicalized. Top-level
    /// null members are dropped, so an unset optional field and an absent
    /// field name the same query.
    pub fn with_filter<F: Serialize + ?Sized>(mut self, filter: &F) -> CacheResult<Self> {
        let json = match serde_json::to_value(filter)? {
            serde_json::Value::Object(members) => serde_json::Value::Object(
                members.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            ),
            other => other,
        };
        self.parts.push(Value::from_json(&json)?);
        Ok(self)
    }

    /// The entity type this key belongs to.
    pub fn kind(&self) -> EntityKind {
        self.root
    }

    /// Parts after the root.
    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// Returns true if this key is the root key.
    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns true if `prefix` is this key or one of its ancestors.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.root == prefix.root
            && self.parts.len() >= prefix.parts.len()
            && self.parts.iter().zip(&prefix.parts).all(|(a, b)| a == b)
    }

    /// The key as one canonical array value: `[root, parts...]`.
    pub fn to_value(&self) -> Value {
        let mut items = Vec::with_capacity(self.parts.len() + 1);
        items.push(Value::text(self.root.as_str()));
        items.extend(self.parts.iter().cloned());
        Value::Array(items)
    }

    /// Parses the array form produced by [`QueryKey::to_value`].
    pub fn from_value(value: &Value) -> CacheResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| CacheError::invalid_key("key is not an array"))?;
        let (root, parts) = items
            .split_first()
            .ok_or_else(|| CacheError::invalid_key("empty key"))?;
        let name = root
            .as_text()
            .ok_or_else(|| CacheError::invalid_key("root is not text"))?;
        let root = EntityKind::from_name(name)
            .ok_or_else(|| CacheError::invalid_key(format!("unknown root {name}")))?;
        Ok(Self {
            root,
            parts: parts.to_vec(),
        })
    }

    /// Canonical CBOR encoding of the key.
    pub fn encode(&self) -> Vec<u8> {
        to_canonical_cbor(&self.to_value())
    }

    /// Short stable digest of the key for logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.encode());
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Pattern matching exactly this key.
    pub fn exact(&self) -> KeyPattern {
        KeyPattern::Exact(self.clone())
    }

    /// Pattern matching this key and every key below it.
    pub fn prefix(&self) -> KeyPattern {
        KeyPattern::Prefix(self.clone())
    }
}

impl From<EntityKind> for QueryKey {
    fn from(kind: EntityKind) -> Self {
        Self::root(kind)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root.as_str())?;
        for part in &self.parts {
            match part {
                Value::Text(s) => write!(f, "/{s}")?,
                other => write!(f, "/{other}")?,
            }
        }
        Ok(())
    }
}

/// Selects cache entries by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    /// One key.
    Exact(QueryKey),
    /// A key and all keys that extend it.
    Prefix(QueryKey),
}

impl KeyPattern {
    /// Returns true if `key` is selected.
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeyPattern::Exact(k) => k == key,
            KeyPattern::Prefix(p) => key.starts_with(p),
        }
    }

    /// The key the pattern is built from.
    pub fn key(&self) -> &QueryKey {
        match self {
            KeyPattern::Exact(k) | KeyPattern::Prefix(k) => k,
        }
    }

    /// Entity type of the pattern.
    pub fn kind(&self) -> EntityKind {
        self.key().kind()
    }
}

impl From<EntityKind> for KeyPattern {
    fn from(kind: EntityKind) -> Self {
        KeyPattern::Prefix(QueryKey::root(kind))
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Exact(k) => write!(f, "{k}"),
            KeyPattern::Prefix(k) => write!(f, "{k}/*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[derive(Serialize)]
    struct FeedFilter {
        scope: &'static str,
        page: u32,
        search: Option<String>,
    }

    #[derive(Serialize)]
    struct FeedFilterReordered {
        search: Option<String>,
        page: u32,
        scope: &'static str,
    }

    #[test]
    fn filter_field_order_is_irrelevant() {
        let a = QueryKey::root(EntityKind::Post)
            .segment("feed")
            .with_filter(&FeedFilter {
                scope: "friends",
                page: 1,
                search: None,
            })
            .unwrap();
        let b = QueryKey::root(EntityKind::Post)
            .segment("feed")
            .with_filter(&FeedFilterReordered {
                search: None,
                page: 1,
                scope: "friends",
            })
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.encode(), b.encode());
        assert_eq!(a.fingerprint(), b.fingerprint());
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn null_members_are_dropped() {
        let a = QueryKey::root(EntityKind::Gym)
            .with_filter(&json!({"query": "iron", "radius": null}))
            .unwrap();
        let b = QueryKey::root(EntityKind::Gym)
            .with_filter(&json!({"query": "iron"}))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prefix_matching() {
        let root = QueryKey::root(EntityKind::Post);
        let detail = QueryKey::detail(EntityKind::Post, &EntityId::Int(42));
        let comments = detail.clone().segment("comments");

        assert!(root.prefix().matches(&comments));
        assert!(detail.prefix().matches(&comments));
        assert!(detail.prefix().matches(&detail));
        assert!(!detail.exact().matches(&comments));
        assert!(!comments.prefix().matches(&detail));
        assert!(!QueryKey::root(EntityKind::User).prefix().matches(&detail));
    }

    #[test]
    fn value_form_roundtrip() {
        let key = QueryKey::detail(EntityKind::GroupWorkout, &EntityId::from("gw-1"))
            .segment("messages");
        assert_eq!(QueryKey::from_value(&key.to_value()).unwrap(), key);
        assert!(QueryKey::from_value(&Value::Array(vec![Value::text("nope")])).is_err());
    }

    #[test]
    fn display_is_readable() {
        let key = QueryKey::detail(EntityKind::WorkoutLog, &EntityId::Int(7));
        assert_eq!(key.to_string(), "logs/detail/7");
        assert_eq!(key.prefix().to_string(), "logs/detail/7/*");
    }

    #[test]
    fn non_finite_filter_member_is_dropped() {
        // serde_json renders NaN as null
        let key = QueryKey::root(EntityKind::Gym)
            .with_filter(&serde_json::Map::from_iter([(
                "lat".to_string(),
                serde_json::Value::from(f64::NAN),
            )]))
            .unwrap();
        assert_eq!(key.parts()[0], Value::map(vec![]));
    }
}
