//! Entity types.

use std::fmt;

/// The entity types the cache is partitioned by.
///
/// Each kind owns one root key namespace. The declaration order is also the
/// order in which per-root locks are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Users, profiles, friends and friend requests.
    User,
    /// Posts, comments and feeds.
    Post,
    /// Training programs.
    Program,
    /// Workout templates and their exercises.
    Workout,
    /// Completed workout logs and their statistics.
    WorkoutLog,
    /// Gyms, local and external.
    Gym,
    /// Notifications and their aggregate counts.
    Notification,
    /// Group workouts, their messages and join requests.
    GroupWorkout,
}

impl EntityKind {
    /// Every kind, in lock order.
    pub const ALL: [EntityKind; 8] = [
        EntityKind::User,
        EntityKind::Post,
        EntityKind::Program,
        EntityKind::Workout,
        EntityKind::WorkoutLog,
        EntityKind::Gym,
        EntityKind::Notification,
        EntityKind::GroupWorkout,
    ];

    /// Name of the root key segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Post => "posts",
            EntityKind::Program => "programs",
            EntityKind::Workout => "workouts",
            EntityKind::WorkoutLog => "logs",
            EntityKind::Gym => "gyms",
            EntityKind::Notification => "notifications",
            EntityKind::GroupWorkout => "group-workouts",
        }
    }

    /// Parses a root key segment.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::from_name("exercises"), None);
    }

    #[test]
    fn all_is_sorted() {
        let mut sorted = EntityKind::ALL;
        sorted.sort();
        assert_eq!(sorted, EntityKind::ALL);
    }
}
