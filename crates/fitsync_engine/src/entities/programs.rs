//! Training programs.

use super::{check_distinct, record_id, Collections};
use crate::cascade::Trigger;
use crate::error::SyncResult;
use crate::sync::{Mutation, ReadQuery, Synchronizer};
use crate::transport::ApiTransport;
use fitsync_cache::{CacheRule, ListPosition, QueryCache, QueryKey};
use fitsync_protocol::model::{NewProgram, Program};
use fitsync_protocol::{ApiRequest, EntityId, EntityKind};
use serde_json::json;

pub(crate) const PROGRAMS: Collections = Collections::new(EntityKind::Program, &["list", "user"]);

/// `programs/list`
pub fn list_key() -> QueryKey {
    PROGRAMS.key("list")
}

/// `programs/detail/<id>`
pub fn detail_key(id: &EntityId) -> QueryKey {
    PROGRAMS.detail(id)
}

/// `programs/user/<id>`
pub fn user_programs_key(user: &EntityId) -> QueryKey {
    PROGRAMS.key("user").id(user)
}

/// Rewrites every cached program so only `active` is marked active.
fn activation_rules(cache: &QueryCache, active: &EntityId) -> SyncResult<Vec<CacheRule>> {
    let mut rules = Vec::new();
    for record in cache.records(&EntityKind::Program.into()) {
        let Ok(mut program) = serde_json::from_value::<Program>(record) else {
            continue;
        };
        let is_active = &program.id == active;
        if program.is_active == is_active {
            continue;
        }
        program.is_active = is_active;
        let id = program.id.clone();
        rules.extend(PROGRAMS.replace_cached(cache, &id, serde_json::to_value(&program)?));
    }
    Ok(rules)
}

/// Reads and writes on programs.
pub struct Programs<'a, T: ApiTransport> {
    sync: &'a Synchronizer<T>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Programs handle.
    pub fn programs(&self) -> Programs<'_, T> {
        Programs { sync: self }
    }
}

impl<T: ApiTransport> Programs<'_, T> {
    /// The current user's programs.
    pub async fn list(&self) -> SyncResult<Vec<Program>> {
        let query = ReadQuery::new(list_key(), ApiRequest::get("/programs/"));
        self.sync.read_as(&query).await
    }

    /// A single program with its workouts.
    pub async fn detail(&self, id: &EntityId) -> SyncResult<Program> {
        let query = ReadQuery::new(detail_key(id), ApiRequest::get(format!("/programs/{id}/")));
        self.sync.read_as(&query).await
    }

    /// Programs owned by another user.
    pub async fn user_programs(&self, user: &EntityId) -> SyncResult<Vec<Program>> {
        let query = ReadQuery::new(
            user_programs_key(user),
            ApiRequest::get(format!("/programs/user/{user}/")),
        );
        self.sync.read_as(&query).await
    }

    /// Creates a program.
    pub async fn create(&self, program: &NewProgram) -> SyncResult<Program> {
        let mutation = Mutation::confirm(ApiRequest::post("/programs/").with_body(program)?)
            .touching(EntityKind::Program)
            .reconcile(|record, _| PROGRAMS.insert(list_key().exact(), ListPosition::Tail, record));
        self.sync.write_as(mutation).await
    }

    /// Edits a program's name, description or other plain fields.
    pub async fn update(&self, id: &EntityId, changes: &NewProgram) -> SyncResult<Program> {
        let mutation =
            Mutation::confirm(ApiRequest::patch(format!("/programs/{id}/")).with_body(changes)?)
                .touching(EntityKind::Program)
                .reconcile(|record, _| PROGRAMS.upsert(record));
        self.sync.write_as(mutation).await
    }

    /// Deletes a program.
    pub async fn delete(&self, id: &EntityId) -> SyncResult<()> {
        let target = id.clone();
        let mutation =
            Mutation::optimistic(ApiRequest::delete(format!("/programs/{id}/")), move |_| {
                Ok(PROGRAMS.remove(&target))
            })
            .touching(EntityKind::Program)
            .cascade(Trigger::ProgramDeleted);
        self.sync.write(mutation).await.map(drop)
    }

    /// Makes `id` the active program, deactivating every other.
    pub async fn activate(&self, id: &EntityId) -> SyncResult<serde_json::Value> {
        let target = id.clone();
        let mutation = Mutation::optimistic(
            ApiRequest::post(format!("/programs/{id}/activate/")),
            move |cache| activation_rules(cache, &target),
        )
        .touching(EntityKind::Program)
        .reconcile(|response, cache| match EntityId::of_record(response) {
            Some(id) => Ok(PROGRAMS.replace_cached(cache, &id, response.clone())),
            None => Ok(Vec::new()),
        })
        .cascade(Trigger::ProgramActivated);
        self.sync.write(mutation).await
    }

    /// Copies a program into the current user's library.
    pub async fn fork(&self, id: &EntityId) -> SyncResult<Program> {
        let original = id.clone();
        let mutation = Mutation::confirm(ApiRequest::post(format!("/programs/{id}/fork/")))
            .touching(EntityKind::Program)
            .reconcile(move |record, cache| {
                record_id(record)?;
                let mut rules = PROGRAMS.edit::<Program, _>(cache, &original, |program| {
                    program.forks_count += 1;
                    Ok(())
                })?;
                rules.extend(PROGRAMS.insert(list_key().exact(), ListPosition::Tail, record)?);
                Ok(rules)
            })
            .cascade(Trigger::ProgramForked);
        self.sync.write_as(mutation).await
    }

    /// Reorders a program's workouts. `order` must list every workout once.
    pub async fn reorder_workouts(&self, id: &EntityId, order: &[EntityId]) -> SyncResult<()> {
        check_distinct(order)?;
        let target = id.clone();
        let ids = order.to_vec();
        let request = ApiRequest::post(format!("/programs/{id}/reorder-workouts/"))
            .with_json(json!({ "workout_ids": order }));
        let mutation = Mutation::optimistic(request, move |cache| {
            PROGRAMS.project::<Program, _>(cache, &target, |program| program.reorder_workouts(&ids))
        })
        .touching(EntityKind::Program);
        self.sync.write(mutation).await.map(drop)
    }
}
