//! Completed workout logs.

use super::user::UserSummary;
use super::workout::Exercise;
use crate::error::{ModelError, ModelResult};
use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// Bounds of the mood and difficulty scales.
pub const RATING_RANGE: (u8, u8) = (1, 10);

/// A workout a user completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutLog {
    /// Log id.
    pub id: EntityId,
    /// Owner.
    #[serde(default)]
    pub user: Option<UserSummary>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Program the workout came from.
    #[serde(default)]
    pub program: Option<EntityId>,
    /// Gym it was performed at.
    #[serde(default)]
    pub gym: Option<EntityId>,
    /// Completion timestamp.
    #[serde(default)]
    pub date: Option<String>,
    /// Duration in minutes.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Mood rating.
    #[serde(default)]
    pub mood_rating: Option<u8>,
    /// Perceived difficulty.
    #[serde(default)]
    pub perceived_difficulty: Option<u8>,
    /// Performed exercises and sets.
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    /// Training partners.
    #[serde(default)]
    pub workout_partners: Vec<EntityId>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Payload for logging a workout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWorkoutLog {
    /// Display name.
    pub name: String,
    /// Source program.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<EntityId>,
    /// Gym.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gym: Option<EntityId>,
    /// Completion timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Duration in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Mood rating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_rating: Option<u8>,
    /// Perceived difficulty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perceived_difficulty: Option<u8>,
    /// Performed exercises.
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    /// Training partners.
    #[serde(default)]
    pub workout_partners: Vec<EntityId>,
}

impl NewWorkoutLog {
    /// Checks ratings and per-exercise set fields.
    pub fn validate(&self) -> ModelResult<()> {
        check_rating("mood_rating", self.mood_rating)?;
        check_rating("perceived_difficulty", self.perceived_difficulty)?;
        self.exercises.iter().try_for_each(Exercise::validate_sets)
    }
}

fn check_rating(field: &'static str, value: Option<u8>) -> ModelResult<()> {
    let (min, max) = RATING_RANGE;
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ModelError::RatingOutOfRange {
            field,
            min,
            max,
            value: v,
        }),
        _ => Ok(()),
    }
}

/// Aggregate training statistics of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutStats {
    /// All-time logged workouts.
    #[serde(default)]
    pub total_workouts: u64,
    /// Logged workouts this week.
    #[serde(default)]
    pub workouts_this_week: u64,
    /// Consecutive active days.
    #[serde(default)]
    pub current_streak: u64,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_are_bounded() {
        let mut log = NewWorkoutLog {
            name: "Legs".into(),
            mood_rating: Some(8),
            ..NewWorkoutLog::default()
        };
        log.validate().unwrap();
        log.perceived_difficulty = Some(11);
        assert_eq!(
            log.validate(),
            Err(ModelError::RatingOutOfRange {
                field: "perceived_difficulty",
                min: 1,
                max: 10,
                value: 11
            })
        );
    }
}
