//! Users, friends and friend requests.

use super::{filtered, Collections};
use crate::cascade::Trigger;
use crate::error::SyncResult;
use crate::sync::{Mutation, ReadQuery, Synchronizer};
use crate::transport::ApiTransport;
use fitsync_cache::{CacheRule, QueryKey};
use fitsync_protocol::model::{FriendRequest, ProfileUpdate, User};
use fitsync_protocol::{ApiRequest, EntityId, EntityKind};
use serde::Serialize;

pub(crate) const USERS: Collections = Collections::new(EntityKind::User, &["search"]);

/// `users/me`
pub fn me_key() -> QueryKey {
    USERS.key("me")
}

/// `users/me/friends`
pub fn friends_key() -> QueryKey {
    me_key().segment("friends")
}

/// `users/detail/<id>`
pub fn detail_key(id: &EntityId) -> QueryKey {
    USERS.detail(id)
}

/// `users/friend-requests`
pub fn friend_requests_key() -> QueryKey {
    USERS.key("friend-requests")
}

#[derive(Serialize)]
struct Search<'a> {
    q: &'a str,
}

pub(crate) fn me_query() -> ReadQuery {
    ReadQuery::new(me_key(), ApiRequest::get("/users/me/"))
}

/// Reads and writes on users.
pub struct Users<'a, T: ApiTransport> {
    sync: &'a Synchronizer<T>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Users handle.
    pub fn users(&self) -> Users<'_, T> {
        Users { sync: self }
    }
}

impl<T: ApiTransport> Users<'_, T> {
    /// The signed-in user.
    pub async fn me(&self) -> SyncResult<User> {
        self.sync.read_as(&me_query()).await
    }

    /// A user's profile.
    pub async fn detail(&self, id: &EntityId) -> SyncResult<User> {
        let query = ReadQuery::new(detail_key(id), ApiRequest::get(format!("/users/{id}/")));
        self.sync.read_as(&query).await
    }

    /// Users matching `text`.
    pub async fn search(&self, text: &str) -> SyncResult<Vec<User>> {
        let filter = Search { q: text };
        let query = ReadQuery::new(
            filtered(USERS.key("search"), &filter)?,
            ApiRequest::get("/users/search/").with_query_from(&filter)?,
        );
        self.sync.read_as(&query).await
    }

    /// The signed-in user's friends.
    pub async fn friends(&self) -> SyncResult<Vec<User>> {
        let query = ReadQuery::new(friends_key(), ApiRequest::get("/users/me/friends/"));
        self.sync.read_as(&query).await
    }

    /// Another user's friends.
    pub async fn friends_of(&self, id: &EntityId) -> SyncResult<Vec<User>> {
        let query = ReadQuery::new(
            USERS.sub(id, "friends"),
            ApiRequest::get(format!("/users/{id}/friends/")),
        );
        self.sync.read_as(&query).await
    }

    /// Pending friend requests addressed to the signed-in user.
    pub async fn friend_requests(&self) -> SyncResult<Vec<FriendRequest>> {
        let query = ReadQuery::new(
            friend_requests_key(),
            ApiRequest::get("/users/friend-requests/"),
        );
        self.sync.read_as(&query).await
    }

    /// Updates the signed-in user's profile.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> SyncResult<User> {
        let mutation = Mutation::confirm(ApiRequest::patch("/users/me/").with_body(update)?)
            .touching(EntityKind::User)
            .reconcile(|me, _| {
                let mut rules = USERS.upsert(me)?;
                rules.push(CacheRule::set(me_key(), me.clone()));
                Ok(rules)
            })
            .cascade(Trigger::ProfileUpdated);
        self.sync.write_as(mutation).await
    }

    /// Sends a friend request to `id`.
    pub async fn send_friend_request(&self, id: &EntityId) -> SyncResult<FriendRequest> {
        let target = id.clone();
        let mutation = Mutation::confirm(ApiRequest::post(format!("/users/{id}/friend-request/")))
            .touching(EntityKind::User)
            .reconcile(move |_, cache| {
                USERS.edit::<User, _>(cache, &target, |user| {
                    user.friend_request_status = Some("pending".to_string());
                    Ok(())
                })
            });
        self.sync.write_as(mutation).await
    }

    /// Accepts or rejects a pending request.
    pub async fn respond_friend_request(
        &self,
        request_id: &EntityId,
        accept: bool,
    ) -> SyncResult<serde_json::Value> {
        let action = if accept { "accept" } else { "reject" };
        let request_id = request_id.clone();
        let path = format!("/users/friend-requests/{request_id}/{action}/");
        let mut mutation = Mutation::confirm(ApiRequest::post(path))
            .touching(EntityKind::User)
            .reconcile(move |_, _| {
                Ok(vec![CacheRule::remove(
                    friend_requests_key().exact(),
                    request_id,
                )])
            });
        if accept {
            mutation = mutation.cascade(Trigger::FriendRequestAccepted);
        }
        self.sync.write(mutation).await
    }

    /// Removes `id` from the signed-in user's friends.
    pub async fn remove_friend(&self, id: &EntityId) -> SyncResult<serde_json::Value> {
        let friend = id.clone();
        let mutation = Mutation::optimistic(
            ApiRequest::delete(format!("/users/{id}/friend/")),
            move |cache| {
                let was_friend = cache.find_record(&friends_key().exact(), &friend).is_some()
                    || USERS
                        .find_as::<User>(cache, &friend)
                        .is_some_and(|u| u.is_friend);
                let mut rules = vec![CacheRule::remove(friends_key().exact(), friend.clone())];
                rules.extend(USERS.edit::<User, _>(cache, &friend, |user| {
                    user.is_friend = false;
                    Ok(())
                })?);
                if was_friend {
                    rules.push(CacheRule::adjust(me_key(), &["friends_count"], -1));
                }
                Ok(rules)
            },
        )
        .touching(EntityKind::User)
        .cascade(Trigger::FriendRemoved);
        self.sync.write(mutation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::testing::{seed, synchronizer};
    use fitsync_protocol::HttpMethod;
    use serde_json::json;

    fn user(id: i64, is_friend: bool, friends: u64) -> serde_json::Value {
        json!({"id": id, "username": format!("u{id}"), "is_friend": is_friend, "friends_count": friends})
    }

    #[tokio::test]
    async fn remove_friend_updates_list_flag_and_count() {
        let (transport, sync) = synchronizer();
        let bea = EntityId::Int(2);
        seed(&sync, &me_key(), user(1, false, 2));
        seed(&sync, &friends_key(), json!([user(2, true, 5), user(3, true, 1)]));
        seed(&sync, &detail_key(&bea), user(2, true, 5));
        transport.respond(HttpMethod::Delete, "/users/2/friend/", json!({}));

        sync.users().remove_friend(&bea).await.unwrap();

        let friends = sync.cache().data(&friends_key()).unwrap();
        assert_eq!(friends.as_array().unwrap().len(), 1);
        assert_eq!(sync.cache().data(&detail_key(&bea)).unwrap()["is_friend"], false);
        assert_eq!(sync.cache().data(&me_key()).unwrap()["friends_count"], 1);
    }

    #[tokio::test]
    async fn failed_remove_friend_keeps_friend() {
        let (transport, sync) = synchronizer();
        seed(&sync, &me_key(), user(1, false, 1));
        seed(&sync, &friends_key(), json!([user(2, true, 5)]));
        transport.fail(HttpMethod::Delete, "/users/2/friend/", 500);

        assert!(sync.users().remove_friend(&EntityId::Int(2)).await.is_err());

        assert_eq!(sync.cache().data(&friends_key()).unwrap(), json!([user(2, true, 5)]));
        assert_eq!(sync.cache().data(&me_key()).unwrap()["friends_count"], 1);
    }

    #[tokio::test]
    async fn profile_update_rewrites_me() {
        let (transport, sync) = synchronizer();
        seed(&sync, &me_key(), user(1, false, 0));
        let mut updated = user(1, false, 0);
        updated["bio"] = json!("deadlifts");
        transport.respond(HttpMethod::Patch, "/users/me/", updated);

        let update = ProfileUpdate {
            bio: Some("deadlifts".into()),
            ..Default::default()
        };
        let me = sync.users().update_profile(&update).await.unwrap();

        assert_eq!(me.bio, "deadlifts");
        assert_eq!(sync.cache().data(&me_key()).unwrap()["bio"], "deadlifts");
        let call = transport.calls().pop().unwrap();
        assert_eq!(call.request.body, Some(json!({"bio": "deadlifts"})));
    }

    #[tokio::test]
    async fn accepted_request_leaves_the_queue() {
        let (transport, sync) = synchronizer();
        let search = filtered(USERS.key("search"), &Search { q: "bea" }).unwrap();
        seed(
            &sync,
            &friend_requests_key(),
            json!([{"id": 8, "from_user": {"id": 4}, "status": "pending"}]),
        );
        seed(&sync, &friends_key(), json!([]));
        seed(&sync, &search, json!([{"id": 4, "username": "bea", "is_friend": false}]));
        transport.respond(
            HttpMethod::Post,
            "/users/friend-requests/8/accept/",
            json!({"status": "accepted"}),
        );

        sync.users()
            .respond_friend_request(&EntityId::Int(8), true)
            .await
            .unwrap();

        assert_eq!(sync.cache().data(&friend_requests_key()).unwrap(), json!([]));
        assert!(sync.cache().get(&friends_key()).unwrap().invalidated);
        assert!(sync.cache().get(&search).unwrap().invalidated);
    }
}
