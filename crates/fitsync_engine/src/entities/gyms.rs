//! Gyms: local records and external search results.
//!
//! An external gym has no local id until it is saved. Saving looks for an
//! already-saved copy with the same external id, first in the cache, then
//! on the server, and only creates a new record if neither has one.

use super::{filtered, Collections};
use crate::cascade::Trigger;
use crate::error::SyncResult;
use crate::sync::{Mutation, ReadQuery, Synchronizer};
use crate::transport::ApiTransport;
use fitsync_cache::{ListPosition, QueryCache, QueryKey};
use fitsync_protocol::model::{Gym, GymSearch};
use fitsync_protocol::{ApiRequest, EntityId, EntityKind, ModelError};
use serde::Serialize;
use tracing::debug;

pub(crate) const GYMS: Collections = Collections::new(EntityKind::Gym, &["list", "search", "lookup"]);

#[derive(Serialize)]
struct ByExternalId<'a> {
    external_id: &'a str,
}

/// `gyms/list`
pub fn list_key() -> QueryKey {
    GYMS.key("list")
}

/// `gyms/search/<filter>`
pub fn search_key(search: &GymSearch) -> SyncResult<QueryKey> {
    filtered(GYMS.key("search"), search)
}

/// `gyms/detail/<id>`
pub fn detail_key(id: &EntityId) -> QueryKey {
    GYMS.detail(id)
}

fn lookup_key(external_id: &str) -> SyncResult<QueryKey> {
    filtered(GYMS.key("lookup"), &ByExternalId { external_id })
}

fn cached_local(cache: &QueryCache, external_id: &str) -> Option<Gym> {
    cache
        .records(&EntityKind::Gym.into())
        .into_iter()
        .filter_map(|record| serde_json::from_value::<Gym>(record).ok())
        .find(|gym| gym.is_local() && gym.external_id.as_deref() == Some(external_id))
}

/// Reads and writes on gyms.
pub struct Gyms<'a, T: ApiTransport> {
    sync: &'a Synchronizer<T>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Gyms handle.
    pub fn gyms(&self) -> Gyms<'_, T> {
        Gyms { sync: self }
    }
}

impl<T: ApiTransport> Gyms<'_, T> {
    /// Local and external gyms matching `search`.
    pub async fn search(&self, search: &GymSearch) -> SyncResult<Vec<Gym>> {
        let query = ReadQuery::new(
            search_key(search)?,
            ApiRequest::get("/gyms/search/").with_query_from(search)?,
        );
        self.sync.read_as(&query).await
    }

    /// Saved gyms.
    pub async fn list(&self) -> SyncResult<Vec<Gym>> {
        let query = ReadQuery::new(list_key(), ApiRequest::get("/gyms/"));
        self.sync.read_as(&query).await
    }

    /// A single saved gym.
    pub async fn detail(&self, id: &EntityId) -> SyncResult<Gym> {
        let query = ReadQuery::new(detail_key(id), ApiRequest::get(format!("/gyms/{id}/")));
        self.sync.read_as(&query).await
    }

    /// Promotes an external gym to a local one, reusing an existing local
    /// copy with the same external id. Local gyms are returned unchanged.
    pub async fn save_external(&self, gym: &Gym) -> SyncResult<Gym> {
        if gym.is_local() {
            return Ok(gym.clone());
        }
        let external_id = gym
            .external_id
            .as_deref()
            .ok_or_else(|| ModelError::Malformed("external gym without external_id".into()))?;

        if let Some(saved) = cached_local(self.sync.cache(), external_id) {
            debug!(external_id, "external gym already saved (cache)");
            return Ok(saved);
        }

        let lookup = ReadQuery::new(
            lookup_key(external_id)?,
            ApiRequest::get("/gyms/").with_query_from(&ByExternalId { external_id })?,
        )
        .forced();
        let matches: Vec<Gym> = self.sync.read_as(&lookup).await?;
        if let Some(saved) = matches.into_iter().find(Gym::is_local) {
            debug!(external_id, "external gym already saved (server)");
            return Ok(saved);
        }

        let mutation = Mutation::confirm(ApiRequest::post("/gyms/").with_body(gym)?)
            .touching(EntityKind::Gym)
            .reconcile(|record, _| GYMS.insert(list_key().exact(), ListPosition::Tail, record))
            .cascade(Trigger::GymSaved);
        self.sync.write_as(mutation).await
    }

    /// Edits a saved gym.
    pub async fn update(&self, gym: &Gym) -> SyncResult<Gym> {
        let id = gym.local_id()?;
        let mutation = Mutation::confirm(ApiRequest::patch(format!("/gyms/{id}/")).with_body(gym)?)
            .touching(EntityKind::Gym)
            .reconcile(|record, _| GYMS.upsert(record));
        self.sync.write_as(mutation).await
    }

    /// Deletes a saved gym.
    pub async fn delete(&self, id: &EntityId) -> SyncResult<()> {
        let target = id.clone();
        let mutation = Mutation::optimistic(ApiRequest::delete(format!("/gyms/{id}/")), move |_| {
            Ok(GYMS.remove(&target))
        })
        .touching(EntityKind::Gym);
        self.sync.write(mutation).await.map(drop)
    }
}
