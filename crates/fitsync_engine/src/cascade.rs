//! Cross-entity cascades.
//!
//! A write on one entity type can leave derived data of other types stale:
//! a new post changes the author's profile counters, a completed log
//! changes the workout statistics. Each such write names a [`Trigger`];
//! the [`CASCADES`] table lists the key prefixes it invalidates. Nothing
//! cascades that is not in the table.

use fitsync_cache::{CacheRule, KeyPattern, QueryKey};
use fitsync_protocol::EntityKind;
use fitsync_protocol::EntityKind::{
    GroupWorkout, Gym, Notification, Post, Program, User, Workout, WorkoutLog,
};
use std::fmt;

/// A write whose effects reach beyond its own records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// A post was created.
    PostCreated,
    /// A post was deleted.
    PostDeleted,
    /// A post was shared.
    PostShared,
    /// A friend request was accepted.
    FriendRequestAccepted,
    /// A friend was removed.
    FriendRemoved,
    /// The current user's profile changed.
    ProfileUpdated,
    /// A program became the active one.
    ProgramActivated,
    /// A program was forked.
    ProgramForked,
    /// A program was deleted.
    ProgramDeleted,
    /// A workout log was created or completed.
    LogCompleted,
    /// A workout log was edited.
    LogUpdated,
    /// A workout log was deleted.
    LogDeleted,
    /// An external gym was saved locally.
    GymSaved,
    /// The current user joined a group workout.
    GroupWorkoutJoined,
    /// The current user left a group workout.
    GroupWorkoutLeft,
    /// Notifications were bulk marked.
    NotificationsCleared,
}

/// A key prefix invalidated by a cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeTarget {
    /// Root of the prefix.
    pub root: EntityKind,
    /// Segments below the root.
    pub path: &'static [&'static str],
}

impl CascadeTarget {
    const fn new(root: EntityKind, path: &'static [&'static str]) -> Self {
        Self { root, path }
    }

    /// The prefix pattern this target invalidates.
    pub fn pattern(&self) -> KeyPattern {
        self.path
            .iter()
            .fold(QueryKey::root(self.root), |key, segment| key.segment(segment))
            .prefix()
    }
}

impl fmt::Display for CascadeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in self.path {
            write!(f, "/{segment}")?;
        }
        f.write_str("/*")
    }
}

const ME: CascadeTarget = CascadeTarget::new(User, &["me"]);
const FEED: CascadeTarget = CascadeTarget::new(Post, &["feed"]);
const USER_POSTS: CascadeTarget = CascadeTarget::new(Post, &["user"]);
const LOG_STATS: CascadeTarget = CascadeTarget::new(WorkoutLog, &["stats"]);
const RECENT_EXERCISES: CascadeTarget = CascadeTarget::new(Workout, &["recent-exercises"]);
const USER_SEARCH: CascadeTarget = CascadeTarget::new(User, &["search"]);

/// The cascade table.
pub const CASCADES: &[(Trigger, &[CascadeTarget])] = &[
    (Trigger::PostCreated, &[ME, USER_POSTS]),
    (Trigger::PostDeleted, &[ME, USER_POSTS]),
    (Trigger::PostShared, &[ME, USER_POSTS]),
    (
        Trigger::FriendRequestAccepted,
        &[ME, CascadeTarget::new(User, &["detail"]), USER_SEARCH, FEED],
    ),
    (
        Trigger::FriendRemoved,
        &[CascadeTarget::new(User, &["detail"]), USER_SEARCH, FEED],
    ),
    (
        Trigger::ProfileUpdated,
        &[
            CascadeTarget::new(Post, &[]),
            CascadeTarget::new(GroupWorkout, &[]),
        ],
    ),
    (
        Trigger::ProgramActivated,
        &[ME, CascadeTarget::new(Workout, &[])],
    ),
    (
        Trigger::ProgramForked,
        &[CascadeTarget::new(Program, &["detail"])],
    ),
    (
        Trigger::ProgramDeleted,
        &[ME, CascadeTarget::new(Workout, &[]), FEED],
    ),
    (Trigger::LogCompleted, &[LOG_STATS, RECENT_EXERCISES, ME]),
    (Trigger::LogUpdated, &[LOG_STATS]),
    (Trigger::LogDeleted, &[LOG_STATS, RECENT_EXERCISES, FEED]),
    (
        Trigger::GymSaved,
        &[CascadeTarget::new(Gym, &["search"])],
    ),
    (
        Trigger::GroupWorkoutJoined,
        &[
            CascadeTarget::new(GroupWorkout, &["list"]),
            CascadeTarget::new(Notification, &["list"]),
        ],
    ),
    (
        Trigger::GroupWorkoutLeft,
        &[CascadeTarget::new(GroupWorkout, &["list"])],
    ),
    (
        Trigger::NotificationsCleared,
        &[CascadeTarget::new(Notification, &["counts"])],
    ),
];

impl Trigger {
    /// Targets this trigger invalidates.
    pub fn targets(self) -> &'static [CascadeTarget] {
        CASCADES
            .iter()
            .find(|(trigger, _)| *trigger == self)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    /// Invalidation rules for this trigger.
    pub fn rules(self) -> Vec<CacheRule> {
        self.targets()
            .iter()
            .map(|target| CacheRule::invalidate(target.pattern()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitsync_cache::QueryCache;
    use serde_json::json;

    const ALL: [Trigger; 16] = [
        Trigger::PostCreated,
        Trigger::PostDeleted,
        Trigger::PostShared,
        Trigger::FriendRequestAccepted,
        Trigger::FriendRemoved,
        Trigger::ProfileUpdated,
        Trigger::ProgramActivated,
        Trigger::ProgramForked,
        Trigger::ProgramDeleted,
        Trigger::LogCompleted,
        Trigger::LogUpdated,
        Trigger::LogDeleted,
        Trigger::GymSaved,
        Trigger::GroupWorkoutJoined,
        Trigger::GroupWorkoutLeft,
        Trigger::NotificationsCleared,
    ];

    #[test]
    fn every_trigger_has_one_row() {
        assert_eq!(CASCADES.len(), ALL.len());
        for trigger in ALL {
            assert_eq!(CASCADES.iter().filter(|(t, _)| *t == trigger).count(), 1);
            assert!(!trigger.targets().is_empty(), "{trigger:?}");
        }
    }

    #[test]
    fn target_display() {
        assert_eq!(LOG_STATS.to_string(), "logs/stats/*");
        assert_eq!(CascadeTarget::new(Post, &[]).to_string(), "posts/*");
    }

    #[test]
    fn log_completion_invalidates_stats_only_by_prefix() {
        let cache = QueryCache::default();
        let stats = QueryKey::root(WorkoutLog).segment("stats");
        let list = QueryKey::root(WorkoutLog).segment("list");
        for key in [&stats, &list] {
            let ticket = cache.begin_fetch(key);
            cache.complete_fetch(&ticket, json!({"total_workouts": 1}));
        }

        cache.apply_rules(&Trigger::LogCompleted.rules());

        assert!(cache.get(&stats).unwrap().invalidated);
        assert!(!cache.get(&list).unwrap().invalidated);
    }
}
