//! Integration tests for the synchronizer over a scripted API.

use fitsync_cache::{CacheRule, QueryKey};
use fitsync_engine::entities::{logs, notifications, posts, programs, users};
use fitsync_engine::{FeedFilter, LogFilter, SessionState, SyncError};
use fitsync_protocol::model::{LoginCredentials, NewPost};
use fitsync_protocol::{EntityId, EntityKind, HttpMethod};
use fitsync_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::json;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn feed() -> QueryKey {
    posts::feed_key(&FeedFilter::default()).unwrap()
}

proptest! {
    #[test]
    fn filter_field_order_does_not_change_the_key((pairs, shuffled) in shuffled_filter_strategy()) {
        let a = QueryKey::root(EntityKind::Post).segment("feed").with_filter(&filter_map(&pairs)).unwrap();
        let b = QueryKey::root(EntityKind::Post).segment("feed").with_filter(&filter_map(&shuffled)).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn failed_like_restores_every_entry(records in record_list_strategy()) {
        prop_assume!(!records.is_empty());
        let target = EntityId::from_json(&records[0]["id"]).unwrap();

        let h = Harness::logged_in();
        seed(&h.sync, &feed(), page(records.clone()));
        seed(&h.sync, &posts::detail_key(&target), records[0].clone());
        h.transport.fail(HttpMethod::Post, &format!("/posts/{target}/like/"), 500);

        let snapshot = |h: &Harness| {
            let cache = h.sync.cache();
            (cache.len(), cache.get(&feed()), cache.get(&posts::detail_key(&target)))
        };
        let before = snapshot(&h);
        let result = runtime().block_on(h.sync.posts().like(&target));

        prop_assert!(result.is_err());
        let after = snapshot(&h);
        prop_assert_eq!(after.0, before.0);
        prop_assert_eq!(after.1.map(|e| (e.data, e.invalidated)), before.1.map(|e| (e.data, e.invalidated)));
        prop_assert_eq!(after.2.map(|e| (e.data, e.invalidated)), before.2.map(|e| (e.data, e.invalidated)));
    }

    #[test]
    fn counters_never_go_negative((start, deltas) in counter_deltas_strategy()) {
        let h = Harness::logged_in();
        let counts = notifications::counts_key();
        seed(&h.sync, &counts, json!({"unread": start}));

        let mut expected = i64::try_from(start).unwrap();
        for delta in deltas {
            h.sync.cache().apply_rules(&[CacheRule::adjust(counts.clone(), &["unread"], delta)]);
            expected = (expected + delta).max(0);
            let unread = h.sync.cache().data(&counts).unwrap()["unread"].as_i64().unwrap();
            prop_assert_eq!(unread, expected);
        }
    }
}

#[test]
fn first_page_and_no_page_share_a_key() {
    assert_eq!(posts::feed_key(&FeedFilter::page(1)).unwrap(), feed());
    assert_ne!(posts::feed_key(&FeedFilter::page(2)).unwrap(), feed());
}

#[tokio::test]
async fn cascades_run_after_reconcile() {
    init_tracing();
    let h = Harness::logged_in();
    let mine = posts::user_posts_key(&EntityId::Int(1));
    seed(&h.sync, &mine, json!([]));
    seed(&h.sync, &users::me_key(), user(1, "ana"));
    h.transport.respond(HttpMethod::Post, "/posts/", post(9, "hello"));

    let new_post = NewPost {
        content: "hello".into(),
        ..Default::default()
    };
    h.sync.posts().create(&new_post).await.unwrap();

    // reconcile wrote the list, then the cascade marked it for refetch
    let entry = h.sync.cache().get(&mine).unwrap();
    assert_eq!(entry.data[0]["id"], 9);
    assert!(entry.invalidated);
    assert!(h.sync.cache().get(&users::me_key()).unwrap().invalidated);
}

#[tokio::test]
async fn anonymous_reads_and_writes_make_no_calls() {
    let h = Harness::anonymous();

    let read = h.sync.posts().feed(&FeedFilter::default()).await;
    let write = h.sync.posts().like(&EntityId::Int(1)).await;

    assert!(matches!(read, Err(SyncError::NotAuthenticated)));
    assert!(matches!(write, Err(SyncError::NotAuthenticated)));
    assert_eq!(h.transport.call_count(), 0);
    assert_eq!(h.sync.session_state(), SessionState::Anonymous);
}

#[tokio::test]
async fn created_post_heads_the_feed_once() {
    let h = Harness::logged_in();
    h.transport
        .respond(HttpMethod::Get, "/posts/feed/", page(vec![post(1, "old")]));
    h.transport.respond(HttpMethod::Post, "/posts/", post(9, "hello"));

    h.sync.posts().feed(&FeedFilter::default()).await.unwrap();
    let new_post = NewPost {
        content: "hello".into(),
        ..Default::default()
    };
    h.sync.posts().create(&new_post).await.unwrap();
    h.sync.posts().create(&new_post).await.unwrap();

    let page = h.sync.posts().feed(&FeedFilter::default()).await.unwrap();
    assert_eq!(page.results[0].content, "hello");
    assert_eq!(page.results.iter().filter(|p| p.id == EntityId::Int(9)).count(), 1);
    assert_eq!(page.results.len(), 2);
    // served from cache
    assert_eq!(h.transport.calls_to(HttpMethod::Get, "/posts/feed/"), 1);
}

#[tokio::test]
async fn like_shows_before_the_server_answers_and_reverts_on_failure() {
    let h = Harness::logged_in();
    seed(&h.sync, &feed(), page(vec![liked_post(3, 3, false)]));
    h.transport.fail(HttpMethod::Post, "/posts/3/like/", 500);
    h.transport.pause();

    let id = EntityId::Int(3);
    let observe = async {
        h.transport.wait_for_calls(1).await;
        let during = h.sync.cache().data(&feed()).unwrap();
        h.transport.resume();
        during
    };
    let posts = h.sync.posts();
    let (result, during) = tokio::join!(posts.like(&id), observe);

    assert_eq!(during["results"][0]["likes_count"], 4);
    assert_eq!(during["results"][0]["is_liked"], true);
    assert!(result.is_err());
    let after = h.sync.cache().data(&feed()).unwrap();
    assert_eq!(after["results"][0]["likes_count"], 3);
    assert_eq!(after["results"][0]["is_liked"], false);
}

#[tokio::test]
async fn login_purges_the_previous_account() {
    init_tracing();
    let h = Harness::logged_in();
    let log_list = logs::list_key(&LogFilter::default()).unwrap();
    seed(&h.sync, &feed(), page(vec![post(1, "theirs")]));
    seed(&h.sync, &programs::list_key(), json!([program(2, "5x5", true)]));
    seed(&h.sync, &log_list, page(vec![workout_log(3, "push")]));
    h.transport
        .respond(HttpMethod::Post, "/auth/login/", json!({"token": "fresh"}));
    h.transport.respond(HttpMethod::Get, "/users/me/", user(7, "bea"));

    let me = h
        .sync
        .login(&LoginCredentials {
            username: "bea".into(),
            password: "hunter2".into(),
        })
        .await
        .unwrap();

    assert_eq!(me.id, EntityId::Int(7));
    assert_eq!(h.token().as_deref(), Some("fresh"));
    assert!(h.sync.cache().get(&feed()).is_none());
    assert!(h.sync.cache().get(&programs::list_key()).is_none());
    assert!(h.sync.cache().get(&log_list).is_none());
    let me_call = h.transport.calls().into_iter().last().unwrap();
    assert_eq!(me_call.token.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn logout_redirects_once() {
    let h = Harness::logged_in();
    seed(&h.sync, &feed(), page(vec![post(1, "mine")]));
    h.transport.respond(HttpMethod::Post, "/auth/logout/", json!({}));

    h.sync.logout().await.unwrap();

    assert_eq!(h.navigator.redirects(), 1);
    assert!(h.token().is_none());
    assert!(h.sync.cache().is_empty());
}

#[tokio::test]
async fn scoped_mark_all_read_clears_one_type() {
    let h = Harness::logged_in();
    let inbox = notifications::list_key(&Default::default()).unwrap();
    seed(
        &h.sync,
        &inbox,
        page(vec![
            notification(1, "like", "normal"),
            notification(2, "comment", "normal"),
        ]),
    );
    seed(
        &h.sync,
        &notifications::counts_key(),
        notification_counts(&[("like", 4), ("comment", 6)], &[("normal", 10)]),
    );
    h.transport
        .respond(HttpMethod::Post, "/notifications/mark-all-read/", json!({}));

    h.sync.notifications().mark_all_read(Some("like")).await.unwrap();

    let counts = h.sync.cache().data(&notifications::counts_key()).unwrap();
    assert_eq!(counts["unread"], 6);
    assert_eq!(counts["by_type"]["like"], 0);
    assert_eq!(counts["by_type"]["comment"], 6);
    assert_eq!(counts["by_priority"]["normal"], 9);
    let list = h.sync.cache().data(&inbox).unwrap();
    assert_eq!(list["results"][0]["is_read"], true);
    assert_eq!(list["results"][1]["is_read"], false);
    let call = h.transport.calls().into_iter().last().unwrap();
    assert_eq!(call.request.body, Some(json!({"notification_type": "like"})));
}

#[tokio::test]
async fn restored_cache_is_refetched_on_first_read() {
    let h = Harness::logged_in();
    h.transport
        .respond(HttpMethod::Get, "/posts/feed/", page(vec![post(1, "old")]));
    h.sync.posts().feed(&FeedFilter::default()).await.unwrap();
    let store = TempPersister::new();
    h.sync.cache().persist_to(&store.persister).unwrap();

    let restarted = Harness::logged_in();
    assert_eq!(restarted.sync.cache().restore_from(&store.persister).unwrap(), 1);
    let restored = restarted.sync.cache().get(&feed()).unwrap();
    assert!(restored.invalidated);
    assert_eq!(restored.data["results"][0]["content"], "old");

    restarted
        .transport
        .respond(HttpMethod::Get, "/posts/feed/", page(vec![post(2, "new")]));
    let page = restarted.sync.posts().feed(&FeedFilter::default()).await.unwrap();
    assert_eq!(page.results[0].content, "new");
}
