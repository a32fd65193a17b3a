//! Training programs.

use super::user::UserSummary;
use super::workout::{reorder, Workout};
use crate::error::ModelResult;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// A training program: an ordered list of workouts owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Program id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Owner.
    #[serde(default)]
    pub creator: Option<UserSummary>,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Whether this is the owner's active program.
    #[serde(default)]
    pub is_active: bool,
    /// Program this one was forked from.
    #[serde(default)]
    pub forked_from: Option<EntityId>,
    /// Number of times this program was forked.
    #[serde(default)]
    pub forks_count: u64,
    /// Workouts in order.
    #[serde(default)]
    pub workouts: Vec<Workout>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Program {
    /// Puts workouts in the given order and rewrites `order` from 0.
    pub fn reorder_workouts(&mut self, ids: &[EntityId]) -> ModelResult<()> {
        reorder(&mut self.workouts, ids, |w| &w.id, |w, order| w.order = order)
    }
}

/// Payload for creating a program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProgram {
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Free-form tags the server understands (difficulty, focus, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NewProgram {
    /// Program with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use serde_json::json;

    #[test]
    fn reorder_workouts_renumbers() {
        let mut program: Program = serde_json::from_value(json!({
            "id": 1,
            "name": "PPL",
            "workouts": [
                {"id": 1, "name": "Push", "order": 0},
                {"id": 2, "name": "Pull", "order": 1},
                {"id": 3, "name": "Legs", "order": 2}
            ]
        }))
        .unwrap();
        program
            .reorder_workouts(&[EntityId::Int(3), EntityId::Int(1), EntityId::Int(2)])
            .unwrap();
        let layout: Vec<_> = program
            .workouts
            .iter()
            .map(|w| (w.id.clone(), w.order))
            .collect();
        assert_eq!(
            layout,
            vec![
                (EntityId::Int(3), 0),
                (EntityId::Int(1), 1),
                (EntityId::Int(2), 2)
            ]
        );
        assert_eq!(
            program.reorder_workouts(&[EntityId::Int(3), EntityId::Int(3), EntityId::Int(1)]),
            Err(ModelError::ReorderMismatch)
        );
    }
}
