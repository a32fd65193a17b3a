//! Workout logs and training statistics.

use super::{filtered, Collections};
use crate::cascade::Trigger;
use crate::error::SyncResult;
use crate::sync::{Mutation, ReadQuery, Synchronizer};
use crate::transport::ApiTransport;
use fitsync_cache::{ListPosition, QueryKey};
use fitsync_protocol::model::{NewWorkoutLog, Page, WorkoutLog, WorkoutStats};
use fitsync_protocol::{ApiRequest, EntityId, EntityKind};
use serde::{Deserialize, Serialize};

pub(crate) const LOGS: Collections = Collections::new(EntityKind::WorkoutLog, &["list", "user"]);

/// Log list filter. The default is the first page of all logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// 1-based page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Only logs of this program.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<EntityId>,
}

/// `logs/list/<filter>`
pub fn list_key(filter: &LogFilter) -> SyncResult<QueryKey> {
    filtered(LOGS.key("list"), filter)
}

/// `logs/detail/<id>`
pub fn detail_key(id: &EntityId) -> QueryKey {
    LOGS.detail(id)
}

/// `logs/user/<id>`
pub fn user_logs_key(user: &EntityId) -> QueryKey {
    LOGS.key("user").id(user)
}

/// `logs/stats`
pub fn stats_key() -> QueryKey {
    LOGS.key("stats")
}

/// Reads and writes on workout logs.
pub struct Logs<'a, T: ApiTransport> {
    sync: &'a Synchronizer<T>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Workout logs handle.
    pub fn logs(&self) -> Logs<'_, T> {
        Logs { sync: self }
    }
}

impl<T: ApiTransport> Logs<'_, T> {
    /// The current user's logs, newest first.
    pub async fn list(&self, filter: &LogFilter) -> SyncResult<Page<WorkoutLog>> {
        let query = ReadQuery::new(
            list_key(filter)?,
            ApiRequest::get("/logs/").with_query_from(filter)?,
        );
        self.sync.read_as(&query).await
    }

    /// A single log.
    pub async fn detail(&self, id: &EntityId) -> SyncResult<WorkoutLog> {
        let query = ReadQuery::new(detail_key(id), ApiRequest::get(format!("/logs/{id}/")));
        self.sync.read_as(&query).await
    }

    /// Another user's logs.
    pub async fn user_logs(&self, user: &EntityId) -> SyncResult<Vec<WorkoutLog>> {
        let query = ReadQuery::new(
            user_logs_key(user),
            ApiRequest::get(format!("/logs/user/{user}/")),
        );
        self.sync.read_as(&query).await
    }

    /// Aggregate training statistics.
    pub async fn stats(&self) -> SyncResult<WorkoutStats> {
        let query = ReadQuery::new(stats_key(), ApiRequest::get("/logs/stats/"));
        self.sync.read_as(&query).await
    }

    /// Records a completed workout. Ratings and sets are validated first.
    pub async fn create(&self, log: &NewWorkoutLog) -> SyncResult<WorkoutLog> {
        log.validate()?;
        let mutation = Mutation::confirm(ApiRequest::post("/logs/").with_body(log)?)
            .touching(EntityKind::WorkoutLog)
            .reconcile(|record, _| {
                let head = list_key(&LogFilter::default())?;
                LOGS.insert(head.exact(), ListPosition::Head, record)
            })
            .cascade(Trigger::LogCompleted);
        self.sync.write_as(mutation).await
    }

    /// Edits a log.
    pub async fn update(&self, id: &EntityId, log: &NewWorkoutLog) -> SyncResult<WorkoutLog> {
        log.validate()?;
        let mutation = Mutation::confirm(ApiRequest::patch(format!("/logs/{id}/")).with_body(log)?)
            .touching(EntityKind::WorkoutLog)
            .reconcile(|record, _| LOGS.upsert(record))
            .cascade(Trigger::LogUpdated);
        self.sync.write_as(mutation).await
    }

    /// Deletes a log.
    pub async fn delete(&self, id: &EntityId) -> SyncResult<()> {
        let target = id.clone();
        let mutation = Mutation::optimistic(ApiRequest::delete(format!("/logs/{id}/")), move |_| {
            Ok(LOGS.remove(&target))
        })
        .touching(EntityKind::WorkoutLog)
        .cascade(Trigger::LogDeleted);
        self.sync.write(mutation).await.map(drop)
    }
}
