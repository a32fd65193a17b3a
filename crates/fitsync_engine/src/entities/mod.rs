//! Per-entity handles.
//!
//! Each handle derives the cache keys of one entity type and builds the
//! reads and writes the app issues against it. Handles borrow the
//! [`Synchronizer`](crate::Synchronizer) and are cheap to create:
//!
//! ```ignore
//! let feed = sync.posts().feed(&FeedFilter::default()).await?;
//! sync.posts().like(&post_id).await?;
//! ```

use crate::error::{SyncError, SyncResult};
use fitsync_cache::{CacheRule, KeyPattern, ListPosition, QueryCache, QueryKey};
use fitsync_protocol::{EntityId, EntityKind, ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

pub mod group_workouts;
pub mod gyms;
pub mod logs;
pub mod notifications;
pub mod posts;
pub mod programs;
pub mod users;
pub mod workouts;

/// Where cached copies of one entity type's records live: a detail entry
/// per record and any number of list families under the same root.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Collections {
    kind: EntityKind,
    lists: &'static [&'static str],
}

impl Collections {
    pub(crate) const fn new(kind: EntityKind, lists: &'static [&'static str]) -> Self {
        Self { kind, lists }
    }

    /// `root/<segment>`
    pub(crate) fn key(&self, segment: &str) -> QueryKey {
        QueryKey::root(self.kind).segment(segment)
    }

    /// `root/detail/<id>`
    pub(crate) fn detail(&self, id: &EntityId) -> QueryKey {
        QueryKey::detail(self.kind, id)
    }

    /// `root/detail/<id>/<sub>`
    pub(crate) fn sub(&self, id: &EntityId, sub: &str) -> QueryKey {
        self.detail(id).segment(sub)
    }

    /// One prefix pattern per list family.
    pub(crate) fn lists(&self) -> Vec<KeyPattern> {
        self.lists.iter().map(|l| self.key(l).prefix()).collect()
    }

    /// The cached copy of a record, detail entry first.
    pub(crate) fn find(&self, cache: &QueryCache, id: &EntityId) -> Option<serde_json::Value> {
        cache
            .data(&self.detail(id))
            .filter(|d| id.matches_json(&d["id"]))
            .or_else(|| {
                self.lists()
                    .iter()
                    .find_map(|pattern| cache.find_record(pattern, id))
            })
    }

    /// Decoded cached copy of a record.
    pub(crate) fn find_as<M: DeserializeOwned>(&self, cache: &QueryCache, id: &EntityId) -> Option<M> {
        self.find(cache, id)
            .and_then(|record| serde_json::from_value(record).ok())
    }

    /// Writes a server record into every list holding it and into its
    /// detail entry.
    pub(crate) fn upsert(&self, record: &serde_json::Value) -> SyncResult<Vec<CacheRule>> {
        let id = record_id(record)?;
        let mut rules: Vec<CacheRule> = self
            .lists()
            .into_iter()
            .map(|pattern| CacheRule::replace(pattern, id.clone(), record.clone()))
            .collect();
        rules.push(CacheRule::set(self.detail(&id), record.clone()));
        Ok(rules)
    }

    /// Like [`upsert`](Self::upsert), but only touches the detail entry if
    /// it is already cached.
    pub(crate) fn replace_cached(
        &self,
        cache: &QueryCache,
        id: &EntityId,
        record: serde_json::Value,
    ) -> Vec<CacheRule> {
        let mut rules: Vec<CacheRule> = self
            .lists()
            .into_iter()
            .map(|pattern| CacheRule::replace(pattern, id.clone(), record.clone()))
            .collect();
        let detail = self.detail(id);
        if cache.get(&detail).is_some() {
            rules.push(CacheRule::set(detail, record));
        }
        rules
    }

    /// Inserts a new server record into one list family and sets its
    /// detail entry.
    pub(crate) fn insert(
        &self,
        family: KeyPattern,
        position: ListPosition,
        record: &serde_json::Value,
    ) -> SyncResult<Vec<CacheRule>> {
        let id = record_id(record)?;
        let insert = match position {
            ListPosition::Head => CacheRule::prepend(family, record.clone()),
            ListPosition::Tail => CacheRule::append(family, record.clone()),
        };
        Ok(vec![insert, CacheRule::set(self.detail(&id), record.clone())])
    }

    /// Removes a record from every list and invalidates its detail
    /// entry and sub-resources.
    pub(crate) fn remove(&self, id: &EntityId) -> Vec<CacheRule> {
        let mut rules: Vec<CacheRule> = self
            .lists()
            .into_iter()
            .map(|pattern| CacheRule::remove(pattern, id.clone()))
            .collect();
        rules.push(CacheRule::invalidate(self.detail(id).prefix()));
        rules
    }

    /// Applies a typed edit to the cached copy of a record and returns the
    /// rules writing it back. Returns no rules if the record is not cached
    /// or does not decode; model errors abort the write.
    pub(crate) fn edit<M, F>(&self, cache: &QueryCache, id: &EntityId, edit: F) -> SyncResult<Vec<CacheRule>>
    where
        M: DeserializeOwned + Serialize,
        F: FnOnce(&mut M) -> ModelResult<()>,
    {
        let Some(mut model) = self.find_as::<M>(cache, id) else {
            return Ok(Vec::new());
        };
        edit(&mut model)?;
        let record = serde_json::to_value(&model)?;
        Ok(self.replace_cached(cache, id, record))
    }

    /// [`edit`](Self::edit) for rules built from the cache rather than from
    /// a server response. A model error here means the cached copy lags the
    /// server, so every copy of the record is invalidated instead.
    pub(crate) fn project<M, F>(&self, cache: &QueryCache, id: &EntityId, edit: F) -> SyncResult<Vec<CacheRule>>
    where
        M: DeserializeOwned + Serialize,
        F: FnOnce(&mut M) -> ModelResult<()>,
    {
        match self.edit::<M, F>(cache, id, edit) {
            Err(SyncError::Model(err)) => {
                debug!(%id, error = %err, "cached copy is out of date, invalidating");
                Ok(self.invalidate(id))
            }
            other => other,
        }
    }

    /// Marks the record's detail entry, its sub-resources and every list
    /// family for refetch.
    pub(crate) fn invalidate(&self, id: &EntityId) -> Vec<CacheRule> {
        let mut rules: Vec<CacheRule> = self.lists().into_iter().map(CacheRule::invalidate).collect();
        rules.push(CacheRule::invalidate(self.detail(id).prefix()));
        rules
    }
}

/// Refuses an ordering that names an item twice.
pub(crate) fn check_distinct(ids: &[EntityId]) -> SyncResult<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    if ids.iter().all(|id| seen.insert(id)) {
        Ok(())
    } else {
        Err(ModelError::ReorderMismatch.into())
    }
}

/// The `id` member of a server record.
pub(crate) fn record_id(record: &serde_json::Value) -> SyncResult<EntityId> {
    EntityId::of_record(record)
        .ok_or_else(|| ModelError::Malformed("record without id".to_string()).into())
}

/// Key part for a filter struct, failing like a cache error would.
pub(crate) fn filtered<F: Serialize + ?Sized>(key: QueryKey, filter: &F) -> SyncResult<QueryKey> {
    Ok(key.with_filter(filter)?)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::auth::{MemoryCredentialStore, NoopNavigator, SessionToken};
    use crate::config::{RetryConfig, SyncConfig};
    use crate::sync::Synchronizer;
    use crate::transport::MockTransport;
    use fitsync_cache::QueryKey;
    use std::sync::Arc;
    use std::time::Duration;

    pub(crate) fn synchronizer() -> (Arc<MockTransport>, Synchronizer<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let config = SyncConfig::new("http://api").with_retry(
            RetryConfig::new(2)
                .with_initial_delay(Duration::from_millis(1))
                .without_jitter(),
        );
        let sync = Synchronizer::new(
            config,
            Arc::clone(&transport),
            Arc::new(MemoryCredentialStore::with_token(SessionToken::new("t"))),
            Arc::new(NoopNavigator),
        );
        (transport, sync)
    }

    pub(crate) fn seed<T: crate::transport::ApiTransport>(
        sync: &Synchronizer<T>,
        key: &QueryKey,
        data: serde_json::Value,
    ) {
        let ticket = sync.cache().begin_fetch(key);
        sync.cache().complete_fetch(&ticket, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitsync_protocol::model::Post;
    use serde_json::json;

    const POSTS: Collections = Collections::new(EntityKind::Post, &["feed", "user"]);

    fn seed(cache: &QueryCache, key: &QueryKey, data: serde_json::Value) {
        let ticket = cache.begin_fetch(key);
        cache.complete_fetch(&ticket, data);
    }

    fn post(id: i64, likes: u64) -> serde_json::Value {
        json!({"id": id, "user": {"id": 1, "username": "ana"}, "likes_count": likes, "is_liked": false})
    }

    #[test]
    fn sub_resource_lists_are_not_record_lists() {
        let cache = QueryCache::default();
        let comments = POSTS.sub(&EntityId::Int(1), "comments");
        seed(&cache, &comments, json!([{"id": 7, "content": "nice"}]));
        seed(&cache, &POSTS.key("feed"), json!({"count": 1, "results": [post(7, 0)]}));

        cache.apply_rules(&POSTS.upsert(&post(7, 5)).unwrap());

        assert_eq!(cache.data(&comments).unwrap(), json!([{"id": 7, "content": "nice"}]));
        assert_eq!(cache.data(&POSTS.key("feed")).unwrap()["results"][0]["likes_count"], 5);
        assert_eq!(cache.data(&POSTS.detail(&EntityId::Int(7))).unwrap(), post(7, 5));
    }

    #[test]
    fn typed_edit_writes_back_everywhere_cached() {
        let cache = QueryCache::default();
        seed(&cache, &POSTS.key("feed"), json!([post(3, 3)]));

        let rules = POSTS
            .edit::<Post, _>(&cache, &EntityId::Int(3), |p| {
                p.toggle_like(true);
                Ok(())
            })
            .unwrap();
        cache.apply_rules(&rules);

        let feed = cache.data(&POSTS.key("feed")).unwrap();
        assert_eq!(feed[0]["likes_count"], 4);
        assert_eq!(feed[0]["is_liked"], true);
        assert!(cache.get(&POSTS.detail(&EntityId::Int(3))).is_none());
    }

    #[test]
    fn uncached_edit_is_empty() {
        let cache = QueryCache::default();
        let rules = POSTS
            .edit::<Post, _>(&cache, &EntityId::Int(3), |_| Err(ModelError::AttachmentConflict))
            .unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn records_need_ids() {
        assert!(record_id(&json!({"name": "x"})).is_err());
        assert_eq!(record_id(&json!({"id": "n-1"})).unwrap(), EntityId::from("n-1"));
    }
}
