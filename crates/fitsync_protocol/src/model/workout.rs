//! Workout templates, exercises and sets.

use crate::error::{ModelError, ModelResult};
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which measurements an exercise's sets record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortType {
    /// Repetitions, optionally weighted.
    #[default]
    Reps,
    /// Held or timed work, in seconds.
    Time,
    /// Covered distance, optionally timed.
    Distance,
}

impl EffortType {
    /// Wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            EffortType::Reps => "reps",
            EffortType::Time => "time",
            EffortType::Distance => "distance",
        }
    }
}

/// One set of an exercise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    /// Set id; absent until the server persists it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    /// Position within the exercise.
    #[serde(default)]
    pub order: u32,
    /// Repetitions (reps).
    #[serde(default)]
    pub reps: Option<u32>,
    /// Load in kilograms (reps).
    #[serde(default)]
    pub weight: Option<f64>,
    /// Duration in seconds (time, optional for distance).
    #[serde(default)]
    pub duration: Option<u32>,
    /// Distance in metres (distance).
    #[serde(default)]
    pub distance: Option<f64>,
    /// Rest after the set, in seconds.
    #[serde(default)]
    pub rest_time: Option<u32>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExerciseSet {
    /// Checks the populated fields against the effort type.
    ///
    /// - reps: `reps` required; no `duration` or `distance`
    /// - time: `duration` required; no `reps`, `weight` or `distance`
    /// - distance: `distance` required; no `reps` or `weight`
    pub fn fits(&self, effort: EffortType) -> bool {
        match effort {
            EffortType::Reps => {
                self.reps.is_some() && self.duration.is_none() && self.distance.is_none()
            }
            EffortType::Time => {
                self.duration.is_some()
                    && self.reps.is_none()
                    && self.weight.is_none()
                    && self.distance.is_none()
            }
            EffortType::Distance => {
                self.distance.is_some() && self.reps.is_none() && self.weight.is_none()
            }
        }
    }
}

/// An exercise inside a workout template or log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Exercise id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Position within the workout.
    #[serde(default)]
    pub order: u32,
    /// Measurement type of the sets.
    #[serde(default)]
    pub effort_type: EffortType,
    /// Sets in order.
    #[serde(default)]
    pub sets: Vec<ExerciseSet>,
    /// Whether this exercise is half of a superset.
    #[serde(default)]
    pub is_superset: bool,
    /// Superset partner in the same workout.
    #[serde(default)]
    pub superset_with: Option<EntityId>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Exercise {
    /// Validates every set against the effort type.
    pub fn validate_sets(&self) -> ModelResult<()> {
        for (index, set) in self.sets.iter().enumerate() {
            if !set.fits(self.effort_type) {
                return Err(ModelError::SetFieldsMismatch {
                    exercise: self.id.clone(),
                    index,
                    effort: self.effort_type.as_str(),
                });
            }
        }
        Ok(())
    }

    fn clear_superset(&mut self) {
        self.is_superset = false;
        self.superset_with = None;
    }
}

/// A workout template: an ordered list of exercises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    /// Workout id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Owning program.
    #[serde(default)]
    pub program: Option<EntityId>,
    /// Position within the program.
    #[serde(default)]
    pub order: u32,
    /// Weekday slot, 0 = Monday.
    #[serde(default)]
    pub day_of_week: Option<u8>,
    /// Exercises in order.
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    /// Members this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Workout {
    /// Checks superset links: no self links, partner present, links symmetric.
    pub fn validate_supersets(&self) -> ModelResult<()> {
        validate_supersets(&self.exercises)
    }

    /// Validates supersets and every exercise's sets.
    pub fn validate(&self) -> ModelResult<()> {
        self.validate_supersets()?;
        self.exercises.iter().try_for_each(Exercise::validate_sets)
    }

    /// Pairs two exercises, dissolving any pairing either had before.
    pub fn pair_superset(&mut self, a: &EntityId, b: &EntityId) -> ModelResult<()> {
        pair_superset(&mut self.exercises, a, b)
    }

    /// Dissolves the superset `exercise` belongs to. No-op if unpaired.
    pub fn unpair_superset(&mut self, exercise: &EntityId) -> ModelResult<()> {
        unpair_superset(&mut self.exercises, exercise)
    }

    /// Removes an exercise, unpairing its partner and closing the order gap.
    pub fn remove_exercise(&mut self, exercise: &EntityId) -> ModelResult<Exercise> {
        unpair_superset(&mut self.exercises, exercise)?;
        let index = self
            .exercises
            .iter()
            .position(|e| &e.id == exercise)
            .ok_or_else(|| ModelError::RecordMissing(exercise.clone()))?;
        let removed = self.exercises.remove(index);
        renumber(&mut self.exercises, |e, order| e.order = order);
        Ok(removed)
    }

    /// Puts exercises in the given order and rewrites `order` from 0.
    pub fn reorder_exercises(&mut self, ids: &[EntityId]) -> ModelResult<()> {
        reorder(&mut self.exercises, ids, |e| &e.id, |e, order| e.order = order)
    }
}

pub(crate) fn validate_supersets(exercises: &[Exercise]) -> ModelResult<()> {
    let by_id: HashMap<&EntityId, &Exercise> = exercises.iter().map(|e| (&e.id, e)).collect();

    for exercise in exercises {
        let Some(partner_id) = &exercise.superset_with else {
            continue;
        };
        if partner_id == &exercise.id {
            return Err(ModelError::SupersetSelf(exercise.id.clone()));
        }
        let partner = by_id
            .get(partner_id)
            .ok_or_else(|| ModelError::SupersetPartnerMissing {
                exercise: exercise.id.clone(),
                partner: partner_id.clone(),
            })?;
        if partner.superset_with.as_ref() != Some(&exercise.id)
            || !partner.is_superset
            || !exercise.is_superset
        {
            return Err(ModelError::SupersetAsymmetric {
                exercise: exercise.id.clone(),
                partner: partner_id.clone(),
            });
        }
    }
    Ok(())
}

fn pair_superset(exercises: &mut [Exercise], a: &EntityId, b: &EntityId) -> ModelResult<()> {
    if a == b {
        return Err(ModelError::SupersetSelf(a.clone()));
    }
    for id in [a, b] {
        if !exercises.iter().any(|e| &e.id == id) {
            return Err(ModelError::RecordMissing(id.clone()));
        }
    }
    unpair_superset(exercises, a)?;
    unpair_superset(exercises, b)?;
    for exercise in exercises.iter_mut() {
        if &exercise.id == a {
            exercise.is_superset = true;
            exercise.superset_with = Some(b.clone());
        } else if &exercise.id == b {
            exercise.is_superset = true;
            exercise.superset_with = Some(a.clone());
        }
    }
    Ok(())
}

fn unpair_superset(exercises: &mut [Exercise], id: &EntityId) -> ModelResult<()> {
    let partner = exercises
        .iter()
        .find(|e| &e.id == id)
        .ok_or_else(|| ModelError::RecordMissing(id.clone()))?
        .superset_with
        .clone();
    for exercise in exercises.iter_mut() {
        if &exercise.id == id || Some(&exercise.id) == partner.as_ref() {
            exercise.clear_superset();
        }
    }
    Ok(())
}

/// Reorders `items` to follow `ids` and renumbers them densely from 0.
pub(crate) fn reorder<T>(
    items: &mut Vec<T>,
    ids: &[EntityId],
    id_of: impl Fn(&T) -> &EntityId,
    set_order: impl Fn(&mut T, u32),
) -> ModelResult<()> {
    if ids.len() != items.len() {
        return Err(ModelError::ReorderMismatch);
    }
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) || !items.iter().any(|item| id_of(item) == id) {
            return Err(ModelError::ReorderMismatch);
        }
    }
    let mut slots: Vec<Option<T>> = items.drain(..).map(Some).collect();
    let ordered: Vec<T> = ids
        .iter()
        .filter_map(|id| {
            slots
                .iter_mut()
                .find(|s| s.as_ref().is_some_and(|item| id_of(item) == id))
                .and_then(Option::take)
        })
        .collect();
    *items = ordered;
    renumber(items, set_order);
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn renumber<T>(items: &mut [T], set_order: impl Fn(&mut T, u32)) {
    for (i, item) in items.iter_mut().enumerate() {
        set_order(item, i as u32);
    }
}
