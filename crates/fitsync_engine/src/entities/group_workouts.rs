//! Group workouts, their participants, join requests and chat.

use super::{filtered, Collections};
use crate::cascade::Trigger;
use crate::error::SyncResult;
use crate::sync::{Mutation, ReadQuery, Synchronizer};
use crate::transport::ApiTransport;
use fitsync_cache::{CacheRule, ListPosition, QueryCache, QueryKey};
use fitsync_protocol::model::{
    GroupMessage, GroupWorkout, GroupWorkoutStatus, JoinRequest, NewGroupWorkout,
};
use fitsync_protocol::{ApiRequest, EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub(crate) const GROUP_WORKOUTS: Collections =
    Collections::new(EntityKind::GroupWorkout, &["list"]);

/// Group workout list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWorkoutFilter {
    /// Only sessions in this state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GroupWorkoutStatus>,
    /// Only sessions at this gym.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gym: Option<EntityId>,
}

/// `group-workouts/list/<filter>`
pub fn list_key(filter: &GroupWorkoutFilter) -> SyncResult<QueryKey> {
    filtered(GROUP_WORKOUTS.key("list"), filter)
}

/// `group-workouts/detail/<id>`
pub fn detail_key(id: &EntityId) -> QueryKey {
    GROUP_WORKOUTS.detail(id)
}

/// `group-workouts/detail/<id>/messages`
pub fn messages_key(id: &EntityId) -> QueryKey {
    GROUP_WORKOUTS.sub(id, "messages")
}

/// `group-workouts/detail/<id>/join-requests`
pub fn join_requests_key(id: &EntityId) -> QueryKey {
    GROUP_WORKOUTS.sub(id, "join-requests")
}

/// Server record if the response is one, else a local participation edit.
fn participation(
    cache: &QueryCache,
    response: &serde_json::Value,
    id: &EntityId,
    joined: bool,
) -> SyncResult<Vec<CacheRule>> {
    if EntityId::of_record(response).as_ref() == Some(id) {
        return GROUP_WORKOUTS.upsert(response);
    }
    GROUP_WORKOUTS.edit::<GroupWorkout, _>(cache, id, |group| {
        if group.is_participant != joined {
            group.is_participant = joined;
            group.participants_count = if joined {
                group.participants_count.saturating_add(1)
            } else {
                group.participants_count.saturating_sub(1)
            };
        }
        Ok(())
    })
}

/// Reads and writes on group workouts.
pub struct GroupWorkouts<'a, T: ApiTransport> {
    sync: &'a Synchronizer<T>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Group workouts handle.
    pub fn group_workouts(&self) -> GroupWorkouts<'_, T> {
        GroupWorkouts { sync: self }
    }
}

impl<T: ApiTransport> GroupWorkouts<'_, T> {
    /// Group workouts matching `filter`.
    pub async fn list(&self, filter: &GroupWorkoutFilter) -> SyncResult<Vec<GroupWorkout>> {
        let query = ReadQuery::new(
            list_key(filter)?,
            ApiRequest::get("/group-workouts/").with_query_from(filter)?,
        );
        self.sync.read_as(&query).await
    }

    /// A single group workout.
    pub async fn detail(&self, id: &EntityId) -> SyncResult<GroupWorkout> {
        let query = ReadQuery::new(
            detail_key(id),
            ApiRequest::get(format!("/group-workouts/{id}/")),
        );
        self.sync.read_as(&query).await
    }

    /// Chat messages, oldest first.
    pub async fn messages(&self, id: &EntityId) -> SyncResult<Vec<GroupMessage>> {
        let query = ReadQuery::new(
            messages_key(id),
            ApiRequest::get(format!("/group-workouts/{id}/messages/")),
        );
        self.sync.read_as(&query).await
    }

    /// Pending join requests, visible to the creator.
    pub async fn join_requests(&self, id: &EntityId) -> SyncResult<Vec<JoinRequest>> {
        let query = ReadQuery::new(
            join_requests_key(id),
            ApiRequest::get(format!("/group-workouts/{id}/join-requests/")),
        );
        self.sync.read_as(&query).await
    }

    /// Schedules a group workout.
    pub async fn create(&self, group: &NewGroupWorkout) -> SyncResult<GroupWorkout> {
        let mutation = Mutation::confirm(ApiRequest::post("/group-workouts/").with_body(group)?)
            .touching(EntityKind::GroupWorkout)
            .reconcile(|record, _| {
                let all = list_key(&GroupWorkoutFilter::default())?;
                GROUP_WORKOUTS.insert(all.exact(), ListPosition::Tail, record)
            });
        self.sync.write_as(mutation).await
    }

    /// Joins a group workout, or asks to if it is invite-only.
    pub async fn join(&self, id: &EntityId) -> SyncResult<serde_json::Value> {
        let target = id.clone();
        let mutation = Mutation::confirm(ApiRequest::post(format!("/group-workouts/{id}/join/")))
            .touching(EntityKind::GroupWorkout)
            .reconcile(move |response, cache| participation(cache, response, &target, true))
            .cascade(Trigger::GroupWorkoutJoined);
        self.sync.write(mutation).await
    }

    /// Leaves a group workout.
    pub async fn leave(&self, id: &EntityId) -> SyncResult<serde_json::Value> {
        let target = id.clone();
        let mutation = Mutation::confirm(ApiRequest::post(format!("/group-workouts/{id}/leave/")))
            .touching(EntityKind::GroupWorkout)
            .reconcile(move |response, cache| participation(cache, response, &target, false))
            .cascade(Trigger::GroupWorkoutLeft);
        self.sync.write(mutation).await
    }

    /// Approves or rejects a join request.
    pub async fn respond_join_request(
        &self,
        id: &EntityId,
        request: &EntityId,
        approve: bool,
    ) -> SyncResult<serde_json::Value> {
        let action = if approve { "approve" } else { "reject" };
        let (group, handled) = (id.clone(), request.clone());
        let mutation = Mutation::confirm(ApiRequest::post(format!(
            "/group-workouts/{id}/join-requests/{request}/{action}/"
        )))
        .touching(EntityKind::GroupWorkout)
        .reconcile(move |_, _| {
            let mut rules = vec![CacheRule::remove(
                join_requests_key(&group).exact(),
                handled,
            )];
            if approve {
                rules.push(CacheRule::invalidate(detail_key(&group).exact()));
            }
            Ok(rules)
        });
        self.sync.write(mutation).await
    }

    /// Posts a chat message.
    pub async fn send_message(&self, id: &EntityId, content: &str) -> SyncResult<GroupMessage> {
        let group = id.clone();
        let mutation = Mutation::confirm(
            ApiRequest::post(format!("/group-workouts/{id}/messages/"))
                .with_json(json!({ "content": content })),
        )
        .touching(EntityKind::GroupWorkout)
        .reconcile(move |record, _| {
            Ok(vec![CacheRule::append(
                messages_key(&group).exact(),
                record.clone(),
            )])
        });
        self.sync.write_as(mutation).await
    }

    /// Cancels a scheduled group workout.
    pub async fn cancel(&self, id: &EntityId) -> SyncResult<()> {
        let target = id.clone();
        let mutation = Mutation::optimistic(
            ApiRequest::post(format!("/group-workouts/{id}/cancel/")),
            move |cache| {
                GROUP_WORKOUTS.edit::<GroupWorkout, _>(cache, &target, |group| {
                    group.status = GroupWorkoutStatus::Cancelled;
                    Ok(())
                })
            },
        )
        .touching(EntityKind::GroupWorkout);
        self.sync.write(mutation).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::notifications;
    use crate::entities::testing::{seed, synchronizer};
    use fitsync_protocol::HttpMethod;

    fn group(id: i64, joined: bool, count: u64) -> serde_json::Value {
        json!({"id": id, "title": "Sunrise run", "is_participant": joined,
               "participants_count": count, "status": "scheduled"})
    }

    #[tokio::test]
    async fn join_without_record_edits_locally() {
        let (transport, sync) = synchronizer();
        let id = EntityId::Int(2);
        seed(&sync, &detail_key(&id), group(2, false, 3));
        let inbox = notifications::list_key(&Default::default()).unwrap();
        seed(&sync, &inbox, json!([]));
        transport.respond(HttpMethod::Post, "/group-workouts/2/join/", json!({"status": "joined"}));

        sync.group_workouts().join(&id).await.unwrap();

        let detail = sync.cache().data(&detail_key(&id)).unwrap();
        assert_eq!(detail["is_participant"], true);
        assert_eq!(detail["participants_count"], 4);
        assert!(sync.cache().get(&inbox).unwrap().invalidated);
    }

    #[tokio::test]
    async fn failed_cancel_restores_status() {
        let (transport, sync) = synchronizer();
        let all = list_key(&GroupWorkoutFilter::default()).unwrap();
        seed(&sync, &all, json!([group(2, true, 1)]));
        transport.fail(HttpMethod::Post, "/group-workouts/2/cancel/", 403);

        assert!(sync.group_workouts().cancel(&EntityId::Int(2)).await.is_err());
        assert_eq!(sync.cache().data(&all).unwrap()[0]["status"], "scheduled");
    }

    #[tokio::test]
    async fn approved_request_leaves_queue() {
        let (transport, sync) = synchronizer();
        let id = EntityId::Int(2);
        seed(&sync, &detail_key(&id), group(2, true, 1));
        seed(
            &sync,
            &join_requests_key(&id),
            json!([{"id": 30, "user": {"id": 4}, "status": "pending"}]),
        );
        transport.respond(
            HttpMethod::Post,
            "/group-workouts/2/join-requests/30/approve/",
            json!({"id": 30, "status": "approved"}),
        );

        sync.group_workouts()
            .respond_join_request(&id, &EntityId::Int(30), true)
            .await
            .unwrap();

        assert_eq!(sync.cache().data(&join_requests_key(&id)).unwrap(), json!([]));
        assert!(sync.cache().get(&detail_key(&id)).unwrap().invalidated);
    }
}
