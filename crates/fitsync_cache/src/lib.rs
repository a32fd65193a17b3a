//! # fitsync cache
//!
//! The process-wide query cache behind the fitsync synchronizer.
//!
//! This crate provides:
//! - [`QueryKey`] and [`KeyPattern`], the semantic key namespace
//! - [`CacheRule`], the rule vocabulary every write is expressed in
//! - [`QueryCache`], the store and rule executor, with fetch tickets,
//!   snapshots, purges, a change feed and statistics
//! - cache images for persistence across restarts
//!
//! ## Usage
//!
//! ```
//! use fitsync_cache::{CacheRule, QueryCache, QueryKey};
//! use fitsync_protocol::EntityKind;
//! use serde_json::json;
//!
//! let cache = QueryCache::default();
//! let feed = QueryKey::root(EntityKind::Post).segment("feed");
//!
//! let ticket = cache.begin_fetch(&feed);
//! cache.complete_fetch(&ticket, json!({"count": 0, "results": []}));
//!
//! cache.apply_rules(&[CacheRule::prepend(feed.exact(), json!({"id": 1}))]);
//! assert_eq!(cache.data(&feed).unwrap()["count"], 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod change_feed;
mod config;
mod entry;
mod error;
mod key;
pub mod list;
mod persist;
mod rule;
mod snapshot;
mod stats;

pub use cache::{FetchTicket, Lookup, QueryCache};
pub use change_feed::{CacheChange, CacheEvent, ChangeFeed};
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult};
pub use key::{KeyPattern, QueryKey, DETAIL, LIST};
pub use list::ListPosition;
pub use persist::{CachePersister, FilePersister, MemoryPersister, IMAGE_VERSION};
pub use rule::{scopes, CacheRule};
pub use snapshot::CacheSnapshot;
pub use stats::{CacheStats, CacheStatsSnapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use fitsync_protocol::{EntityId, EntityKind};
    use proptest::prelude::*;
    use serde_json::json;

    fn counts_key() -> QueryKey {
        QueryKey::root(EntityKind::Notification).segment("counts")
    }

    fn arb_rule() -> impl Strategy<Value = CacheRule> {
        let feed = QueryKey::root(EntityKind::Post).segment("feed");
        let detail_of = |id: i64| QueryKey::detail(EntityKind::Post, &EntityId::Int(id));
        prop_oneof![
            (0..6i64).prop_map({
                let feed = feed.clone();
                move |id| CacheRule::prepend(feed.prefix(), json!({"id": id, "v": "new"}))
            }),
            (0..6i64).prop_map({
                let feed = feed.clone();
                move |id| CacheRule::remove(feed.prefix(), EntityId::Int(id))
            }),
            (0..6i64).prop_map(move |id| CacheRule::set(detail_of(id), json!({"id": id}))),
            (-5..5i64).prop_map(|d| CacheRule::adjust(counts_key(), &["unread"], d)),
            Just(CacheRule::invalidate(EntityKind::Post)),
        ]
    }

    proptest! {
        #[test]
        fn counters_never_negative(deltas in prop::collection::vec(-20..20i64, 1..30)) {
            let cache = QueryCache::default();
            let ticket = cache.begin_fetch(&counts_key());
            cache.complete_fetch(&ticket, json!({"unread": 3}));
            for delta in deltas {
                cache.apply_rules(&[CacheRule::adjust(counts_key(), &["unread"], delta)]);
                let unread = cache.data(&counts_key()).unwrap()["unread"].as_i64().unwrap();
                prop_assert!(unread >= 0);
            }
        }

        #[test]
        fn restore_is_identity(rules in prop::collection::vec(arb_rule(), 1..12)) {
            let cache = QueryCache::default();
            let feed = QueryKey::root(EntityKind::Post).segment("feed");
            for (key, data) in [
                (feed.clone(), json!({"count": 2, "results": [{"id": 1}, {"id": 2}]})),
                (counts_key(), json!({"unread": 4})),
                (QueryKey::detail(EntityKind::Post, &EntityId::Int(1)), json!({"id": 1})),
            ] {
                let ticket = cache.begin_fetch(&key);
                cache.complete_fetch(&ticket, data);
            }
            let mut before: Vec<_> = cache
                .keys(&QueryKey::root(EntityKind::Post).prefix())
                .into_iter()
                .chain(std::iter::once(counts_key()))
                .map(|k| (k.to_string(), cache.get(&k)))
                .collect();
            before.sort_by(|a, b| a.0.cmp(&b.0));

            let snapshot = cache.snapshot(&scopes(&rules));
            cache.apply_rules(&rules);
            cache.restore(snapshot);

            let mut after: Vec<_> = cache
                .keys(&QueryKey::root(EntityKind::Post).prefix())
                .into_iter()
                .chain(std::iter::once(counts_key()))
                .map(|k| (k.to_string(), cache.get(&k)))
                .collect();
            after.sort_by(|a, b| a.0.cmp(&b.0));
            prop_assert_eq!(before, after);
        }
    }
}
