//! Notifications and the aggregate counters cached beside them.
//!
//! `notifications/counts` is a separate server document. Every write that
//! flips a cached notification's `is_read` or `is_seen` carries the counter
//! adjustments that keep the aggregate in step, inside the same write, so
//! both roll back together. `by_type` and `by_priority` count unread
//! notifications.

use super::{filtered, Collections};
use crate::cascade::Trigger;
use crate::error::SyncResult;
use crate::sync::{Mutation, ReadQuery, Synchronizer};
use crate::transport::ApiTransport;
use fitsync_cache::{CacheRule, QueryCache, QueryKey};
use fitsync_protocol::model::{counts_field, Notification, NotificationCounts, Page};
use fitsync_protocol::{ApiRequest, EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

pub(crate) const NOTIFICATIONS: Collections =
    Collections::new(EntityKind::Notification, &["list"]);

/// Notification list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFilter {
    /// 1-based page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Only this type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    /// Only read or only unread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
}

/// `notifications/list/<filter>`
pub fn list_key(filter: &NotificationFilter) -> SyncResult<QueryKey> {
    filtered(NOTIFICATIONS.key("list"), filter)
}

/// `notifications/counts`
pub fn counts_key() -> QueryKey {
    NOTIFICATIONS.key("counts")
}

/// Counter rules for `n` leaving (`delta < 0`) or entering the unread set.
fn unread_rules(n: &Notification, delta: i64) -> Vec<CacheRule> {
    vec![
        CacheRule::adjust(counts_key(), &[counts_field::UNREAD], delta),
        CacheRule::adjust(
            counts_key(),
            &[counts_field::BY_TYPE, n.notification_type.as_str()],
            delta,
        ),
        CacheRule::adjust(
            counts_key(),
            &[counts_field::BY_PRIORITY, n.priority.as_str()],
            delta,
        ),
    ]
}

/// Every distinct notification held in the cache.
fn cached_notifications(cache: &QueryCache) -> Vec<Notification> {
    cache
        .records(&EntityKind::Notification.into())
        .into_iter()
        .filter_map(|record| serde_json::from_value(record).ok())
        .collect()
}

fn cached_counts(cache: &QueryCache) -> Option<NotificationCounts> {
    cache
        .data(&counts_key())
        .and_then(|data| serde_json::from_value(data).ok())
}

fn write_back(cache: &QueryCache, n: &Notification) -> SyncResult<Vec<CacheRule>> {
    Ok(NOTIFICATIONS.replace_cached(cache, &n.id, serde_json::to_value(n)?))
}

fn i64_of(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn decrement(path: &[&str], count: u64) -> CacheRule {
    CacheRule::adjust(counts_key(), path, -i64_of(count))
}

/// Speculative rules for marking every unread notification of `kind` (or of
/// any type) read.
fn mark_all_read_rules(cache: &QueryCache, kind: Option<&str>) -> SyncResult<Vec<CacheRule>> {
    let mut rules = Vec::new();
    let mut by_priority: BTreeMap<String, u64> = BTreeMap::new();
    for mut n in cached_notifications(cache) {
        if n.is_read || kind.is_some_and(|k| k != n.notification_type) {
            continue;
        }
        *by_priority.entry(n.priority.clone()).or_default() += 1;
        n.is_read = true;
        rules.extend(write_back(cache, &n)?);
    }

    let Some(counts) = cached_counts(cache) else {
        return Ok(rules);
    };
    match kind {
        None => {
            rules.push(decrement(&[counts_field::UNREAD], counts.unread));
            for (t, count) in &counts.by_type {
                rules.push(decrement(&[counts_field::BY_TYPE, t.as_str()], *count));
            }
            for (p, count) in &counts.by_priority {
                rules.push(decrement(&[counts_field::BY_PRIORITY, p.as_str()], *count));
            }
        }
        Some(kind) => {
            let of_type = counts.by_type.get(kind).copied().unwrap_or(0);
            rules.push(decrement(&[counts_field::UNREAD], of_type));
            rules.push(decrement(&[counts_field::BY_TYPE, kind], of_type));
            // the aggregate has no type x priority breakdown, so use what is cached
            for (p, count) in &by_priority {
                rules.push(decrement(&[counts_field::BY_PRIORITY, p.as_str()], *count));
            }
        }
    }
    Ok(rules)
}

/// Reads and writes on notifications.
pub struct Notifications<'a, T: ApiTransport> {
    sync: &'a Synchronizer<T>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Notifications handle.
    pub fn notifications(&self) -> Notifications<'_, T> {
        Notifications { sync: self }
    }
}

impl<T: ApiTransport> Notifications<'_, T> {
    /// One page of notifications, newest first.
    pub async fn list(&self, filter: &NotificationFilter) -> SyncResult<Page<Notification>> {
        let query = ReadQuery::new(
            list_key(filter)?,
            ApiRequest::get("/notifications/").with_query_from(filter)?,
        );
        self.sync.read_as(&query).await
    }

    /// Aggregate counters.
    pub async fn counts(&self) -> SyncResult<NotificationCounts> {
        let query = ReadQuery::new(counts_key(), ApiRequest::get("/notifications/counts/"));
        self.sync.read_as(&query).await
    }

    /// Marks one notification read.
    pub async fn mark_read(&self, id: &EntityId) -> SyncResult<()> {
        let target = id.clone();
        let mutation = Mutation::optimistic(
            ApiRequest::post(format!("/notifications/{id}/read/")),
            move |cache| {
                let Some(mut n) = NOTIFICATIONS.find_as::<Notification>(cache, &target) else {
                    return Ok(vec![CacheRule::invalidate(counts_key().exact())]);
                };
                if n.is_read {
                    return Ok(Vec::new());
                }
                n.is_read = true;
                let mut rules = write_back(cache, &n)?;
                rules.extend(unread_rules(&n, -1));
                Ok(rules)
            },
        )
        .touching(EntityKind::Notification);
        self.sync.write(mutation).await.map(drop)
    }

    /// Marks one notification seen.
    pub async fn mark_seen(&self, id: &EntityId) -> SyncResult<()> {
        let target = id.clone();
        let mutation = Mutation::optimistic(
            ApiRequest::post(format!("/notifications/{id}/seen/")),
            move |cache| {
                let Some(mut n) = NOTIFICATIONS.find_as::<Notification>(cache, &target) else {
                    return Ok(vec![CacheRule::invalidate(counts_key().exact())]);
                };
                if n.is_seen {
                    return Ok(Vec::new());
                }
                n.is_seen = true;
                let mut rules = write_back(cache, &n)?;
                rules.push(CacheRule::adjust(counts_key(), &[counts_field::UNSEEN], -1));
                Ok(rules)
            },
        )
        .touching(EntityKind::Notification);
        self.sync.write(mutation).await.map(drop)
    }

    /// Marks every notification read, or only those of `kind`.
    pub async fn mark_all_read(&self, kind: Option<&str>) -> SyncResult<()> {
        let request = match kind {
            Some(kind) => ApiRequest::post("/notifications/mark-all-read/")
                .with_json(json!({ "notification_type": kind })),
            None => ApiRequest::post("/notifications/mark-all-read/"),
        };
        let kind = kind.map(str::to_string);
        let mutation = Mutation::optimistic(request, move |cache| {
            mark_all_read_rules(cache, kind.as_deref())
        })
        .touching(EntityKind::Notification)
        .cascade(Trigger::NotificationsCleared);
        self.sync.write(mutation).await.map(drop)
    }

    /// Marks every notification seen.
    pub async fn mark_all_seen(&self) -> SyncResult<()> {
        let mutation = Mutation::optimistic(
            ApiRequest::post("/notifications/mark-all-seen/"),
            |cache| {
                let mut rules = Vec::new();
                for mut n in cached_notifications(cache) {
                    if !n.is_seen {
                        n.is_seen = true;
                        rules.extend(write_back(cache, &n)?);
                    }
                }
                if let Some(counts) = cached_counts(cache) {
                    rules.push(CacheRule::adjust(
                        counts_key(),
                        &[counts_field::UNSEEN],
                        -i64_of(counts.unseen),
                    ));
                }
                Ok(rules)
            },
        )
        .touching(EntityKind::Notification)
        .cascade(Trigger::NotificationsCleared);
        self.sync.write(mutation).await.map(drop)
    }

    /// Deletes a notification.
    pub async fn delete(&self, id: &EntityId) -> SyncResult<()> {
        let target = id.clone();
        let mutation = Mutation::optimistic(
            ApiRequest::delete(format!("/notifications/{id}/")),
            move |cache| {
                let known = NOTIFICATIONS.find_as::<Notification>(cache, &target);
                let mut rules = NOTIFICATIONS.remove(&target);
                let Some(n) = known else {
                    rules.push(CacheRule::invalidate(counts_key().exact()));
                    return Ok(rules);
                };
                rules.push(CacheRule::adjust(counts_key(), &[counts_field::TOTAL], -1));
                if !n.is_read {
                    rules.extend(unread_rules(&n, -1));
                }
                if !n.is_seen {
                    rules.push(CacheRule::adjust(counts_key(), &[counts_field::UNSEEN], -1));
                }
                Ok(rules)
            },
        )
        .touching(EntityKind::Notification);
        self.sync.write(mutation).await.map(drop)
    }
}
