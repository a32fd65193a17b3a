//! Integration tests for the query cache.

use fitsync_cache::{
    CacheChange, CacheConfig, CacheRule, KeyPattern, Lookup, QueryCache, QueryKey,
};
use fitsync_protocol::{EntityId, EntityKind};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Serialize)]
struct LogFilter {
    user: i64,
    program: Option<i64>,
    ordering: &'static str,
}

fn seed(cache: &QueryCache, key: &QueryKey, data: serde_json::Value) {
    let ticket = cache.begin_fetch(key);
    assert!(cache.complete_fetch(&ticket, data));
}

#[test]
fn filtered_lists_share_one_prefix() {
    let cache = QueryCache::new(CacheConfig::new().with_stale_time(Duration::from_secs(30)));
    let lists = QueryKey::root(EntityKind::WorkoutLog).segment("list");
    let mine = lists
        .clone()
        .with_filter(&LogFilter {
            user: 1,
            program: None,
            ordering: "-date",
        })
        .unwrap();
    let by_program = lists
        .clone()
        .with_filter(&LogFilter {
            user: 1,
            program: Some(4),
            ordering: "-date",
        })
        .unwrap();
    seed(&cache, &mine, json!({"count": 1, "results": [{"id": 10}]}));
    seed(&cache, &by_program, json!({"count": 0, "results": []}));

    cache.apply_rules(&[CacheRule::prepend(lists.prefix(), json!({"id": 11}))]);

    assert_eq!(cache.data(&mine).unwrap()["count"], 2);
    assert_eq!(cache.data(&by_program).unwrap()["results"], json!([{"id": 11}]));
}

#[test]
fn cascade_style_invalidation_keeps_data_for_display() {
    let cache = QueryCache::default();
    let stats = QueryKey::root(EntityKind::WorkoutLog).segment("stats");
    seed(&cache, &stats, json!({"total_workouts": 4}));

    let rx = cache.subscribe();
    cache.apply_rules(&[CacheRule::invalidate(stats.prefix())]);

    assert_eq!(
        cache.lookup(&stats, Duration::from_secs(3600)),
        Lookup::Stale(json!({"total_workouts": 4}))
    );
    let event = rx.try_recv().unwrap();
    assert_eq!(event.change, CacheChange::Invalidated);
    assert_eq!(event.key, stats);
}

#[test]
fn purge_by_root_leaves_other_roots() {
    let cache = QueryCache::default();
    seed(&cache, &QueryKey::root(EntityKind::Post).segment("feed"), json!([]));
    seed(&cache, &QueryKey::root(EntityKind::Gym).segment("list"), json!([]));

    let removed = cache.purge(&[KeyPattern::from(EntityKind::Post)]);

    assert_eq!(removed, 1);
    assert_eq!(cache.len(), 1);
    assert!(cache.keys(&EntityKind::Post.into()).is_empty());
}

#[test]
fn concurrent_rule_sets_are_atomic() {
    let cache = Arc::new(QueryCache::default());
    let counts = QueryKey::root(EntityKind::Notification).segment("counts");
    seed(&cache, &counts, json!({"unread": 0, "unseen": 0}));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let counts = counts.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    cache.apply_rules(&[
                        CacheRule::adjust(counts.clone(), &["unread"], 1),
                        CacheRule::adjust(counts.clone(), &["unseen"], 1),
                    ]);
                    let data = cache.data(&counts).unwrap();
                    assert_eq!(data["unread"], data["unseen"]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.data(&counts).unwrap()["unread"], 400);
}

#[test]
fn record_lookup_spans_lists_and_details() {
    let cache = QueryCache::default();
    let programs = QueryKey::root(EntityKind::Program);
    seed(
        &cache,
        &programs.clone().segment("list"),
        json!([{"id": 1, "is_active": true}, {"id": 2, "is_active": false}]),
    );
    assert_eq!(
        cache.find_record(&programs.prefix(), &EntityId::Int(2)),
        Some(json!({"id": 2, "is_active": false}))
    );
    assert_eq!(cache.records(&programs.prefix()).len(), 2);
}
