//! Workouts, their exercises, sets and supersets.
//!
//! Structural edits (remove, reorder, superset pairing) are applied to the
//! cached workout through the model's own operations, so ordering stays
//! dense and pairing stays symmetric in the cache exactly as on the server.
//! When the cached workout disagrees with the request, the request is still
//! sent and the cached workout is invalidated instead. Only malformed input
//! (self-pairing, an ordering naming an exercise twice) fails before any call.

use super::{check_distinct, filtered, Collections};
use crate::error::SyncResult;
use crate::sync::{Mutation, ReadQuery, Synchronizer};
use crate::transport::ApiTransport;
use fitsync_cache::QueryKey;
use fitsync_protocol::model::{EffortType, Exercise, ExerciseSet, Workout};
use fitsync_protocol::{ApiRequest, EntityId, EntityKind, ModelError};
use serde::Serialize;
use serde_json::json;

pub(crate) const WORKOUTS: Collections = Collections::new(EntityKind::Workout, &["list"]);

#[derive(Serialize)]
struct ByProgram<'a> {
    program: &'a EntityId,
}

/// `workouts/list/{program}`
pub fn list_key(program: &EntityId) -> SyncResult<QueryKey> {
    filtered(WORKOUTS.key("list"), &ByProgram { program })
}

/// `workouts/detail/<id>`
pub fn detail_key(id: &EntityId) -> QueryKey {
    WORKOUTS.detail(id)
}

/// `workouts/recent-exercises`
pub fn recent_exercises_key() -> QueryKey {
    WORKOUTS.key("recent-exercises")
}

fn check_sets(exercise: &EntityId, effort: EffortType, sets: &[ExerciseSet]) -> SyncResult<()> {
    match sets.iter().position(|set| !set.fits(effort)) {
        Some(index) => Err(ModelError::SetFieldsMismatch {
            exercise: exercise.clone(),
            index,
            effort: effort.as_str(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Reads and writes on workouts.
pub struct Workouts<'a, T: ApiTransport> {
    sync: &'a Synchronizer<T>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Workouts handle.
    pub fn workouts(&self) -> Workouts<'_, T> {
        Workouts { sync: self }
    }
}

impl<T: ApiTransport> Workouts<'_, T> {
    /// Workouts of one program.
    pub async fn list(&self, program: &EntityId) -> SyncResult<Vec<Workout>> {
        let query = ReadQuery::new(
            list_key(program)?,
            ApiRequest::get("/workouts/").with_query("program", program),
        );
        self.sync.read_as(&query).await
    }

    /// A single workout with its exercises.
    pub async fn detail(&self, id: &EntityId) -> SyncResult<Workout> {
        let query = ReadQuery::new(detail_key(id), ApiRequest::get(format!("/workouts/{id}/")));
        self.sync.read_as(&query).await
    }

    /// Exercises the current user logged recently, for quick picking.
    pub async fn recent_exercises(&self) -> SyncResult<Vec<serde_json::Value>> {
        let query = ReadQuery::new(
            recent_exercises_key(),
            ApiRequest::get("/workouts/recent-exercises/"),
        );
        self.sync.read_as(&query).await
    }

    /// Replaces a workout. The workout is validated first.
    pub async fn update(&self, workout: &Workout) -> SyncResult<Workout> {
        workout.validate()?;
        let mutation = Mutation::confirm(
            ApiRequest::put(format!("/workouts/{}/", workout.id)).with_body(workout)?,
        )
        .touching(EntityKind::Workout)
        .reconcile(|record, _| WORKOUTS.upsert(record));
        self.sync.write_as(mutation).await
    }

    /// Appends an exercise to a workout.
    pub async fn add_exercise(
        &self,
        workout: &EntityId,
        name: &str,
        effort: EffortType,
        sets: &[ExerciseSet],
    ) -> SyncResult<Exercise> {
        check_sets(workout, effort, sets)?;
        let target = workout.clone();
        let request = ApiRequest::post(format!("/workouts/{workout}/exercises/"))
            .with_json(json!({"name": name, "effort_type": effort, "sets": sets}));
        let mutation = Mutation::confirm(request)
            .touching(EntityKind::Workout)
            .reconcile(move |record, cache| {
                let exercise: Exercise = serde_json::from_value(record.clone())?;
                WORKOUTS.edit::<Workout, _>(cache, &target, |workout| {
                    workout.exercises.retain(|e| e.id != exercise.id);
                    let mut exercise = exercise;
                    exercise.order = u32::try_from(workout.exercises.len()).unwrap_or(u32::MAX);
                    workout.exercises.push(exercise);
                    Ok(())
                })
            });
        self.sync.write_as(mutation).await
    }

    /// Removes an exercise, dissolving its superset.
    pub async fn remove_exercise(&self, workout: &EntityId, exercise: &EntityId) -> SyncResult<()> {
        let (target, gone) = (workout.clone(), exercise.clone());
        let mutation = Mutation::optimistic(
            ApiRequest::delete(format!("/workouts/{workout}/exercises/{exercise}/")),
            move |cache| {
                WORKOUTS.project::<Workout, _>(cache, &target, |workout| {
                    workout.remove_exercise(&gone).map(drop)
                })
            },
        )
        .touching(EntityKind::Workout);
        self.sync.write(mutation).await.map(drop)
    }

    /// Reorders a workout's exercises. `order` must list every exercise once.
    pub async fn reorder_exercises(&self, workout: &EntityId, order: &[EntityId]) -> SyncResult<()> {
        check_distinct(order)?;
        let target = workout.clone();
        let ids = order.to_vec();
        let request = ApiRequest::post(format!("/workouts/{workout}/reorder-exercises/"))
            .with_json(json!({ "exercise_ids": order }));
        let mutation = Mutation::optimistic(request, move |cache| {
            WORKOUTS.project::<Workout, _>(cache, &target, |workout| workout.reorder_exercises(&ids))
        })
        .touching(EntityKind::Workout);
        self.sync.write(mutation).await.map(drop)
    }

    /// Pairs two exercises as a superset, dissolving their earlier pairings.
    pub async fn pair_superset(
        &self,
        workout: &EntityId,
        a: &EntityId,
        b: &EntityId,
    ) -> SyncResult<()> {
        if a == b {
            return Err(ModelError::SupersetSelf(a.clone()).into());
        }
        let (target, first, second) = (workout.clone(), a.clone(), b.clone());
        let request = ApiRequest::post(format!("/workouts/{workout}/exercises/{a}/superset/"))
            .with_json(json!({ "partner": b }));
        let mutation = Mutation::optimistic(request, move |cache| {
            WORKOUTS.project::<Workout, _>(cache, &target, |workout| {
                workout.pair_superset(&first, &second)
            })
        })
        .touching(EntityKind::Workout);
        self.sync.write(mutation).await.map(drop)
    }

    /// Dissolves the superset `exercise` belongs to.
    pub async fn unpair_superset(&self, workout: &EntityId, exercise: &EntityId) -> SyncResult<()> {
        let (target, single) = (workout.clone(), exercise.clone());
        let mutation = Mutation::optimistic(
            ApiRequest::delete(format!("/workouts/{workout}/exercises/{exercise}/superset/")),
            move |cache| {
                WORKOUTS.project::<Workout, _>(cache, &target, |workout| {
                    workout.unpair_superset(&single)
                })
            },
        )
        .touching(EntityKind::Workout);
        self.sync.write(mutation).await.map(drop)
    }

    /// Replaces an exercise's sets, switching its effort type.
    pub async fn update_sets(
        &self,
        workout: &EntityId,
        exercise: &EntityId,
        effort: EffortType,
        sets: &[ExerciseSet],
    ) -> SyncResult<Vec<ExerciseSet>> {
        check_sets(exercise, effort, sets)?;
        let (target, edited) = (workout.clone(), exercise.clone());
        let sent = sets.to_vec();
        let request = ApiRequest::put(format!("/workouts/{workout}/exercises/{exercise}/sets/"))
            .with_json(json!({"effort_type": effort, "sets": sets}));
        let mutation = Mutation::confirm(request)
            .touching(EntityKind::Workout)
            .reconcile(move |response, cache| {
                let sets: Vec<ExerciseSet> = match response {
                    serde_json::Value::Array(_) => serde_json::from_value(response.clone())?,
                    _ => sent,
                };
                WORKOUTS.project::<Workout, _>(cache, &target, |workout| {
                    let exercise = workout
                        .exercises
                        .iter_mut()
                        .find(|e| e.id == edited)
                        .ok_or_else(|| ModelError::RecordMissing(edited.clone()))?;
                    exercise.effort_type = effort;
                    exercise.sets = sets;
                    Ok(())
                })
            });
        let response = self.sync.write(mutation).await?;
        match response {
            serde_json::Value::Array(_) => Ok(serde_json::from_value(response)?),
            _ => Ok(sets.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::testing::{seed, synchronizer};
    use crate::error::SyncError;
    use fitsync_protocol::HttpMethod;

    fn workout() -> serde_json::Value {
        json!({"id": 1, "name": "Push", "exercises": [
            {"id": 10, "name": "Bench", "order": 0},
            {"id": 11, "name": "Dips", "order": 1},
            {"id": 12, "name": "Flyes", "order": 2}
        ]})
    }

    fn cached(sync: &Synchronizer<crate::transport::MockTransport>) -> Workout {
        serde_json::from_value(sync.cache().data(&detail_key(&EntityId::Int(1))).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn pairing_is_symmetric_in_cache() {
        let (transport, sync) = synchronizer();
        seed(&sync, &detail_key(&EntityId::Int(1)), workout());
        transport.respond(HttpMethod::Post, "/workouts/1/exercises/10/superset/", json!(null));

        sync.workouts()
            .pair_superset(&EntityId::Int(1), &EntityId::Int(10), &EntityId::Int(12))
            .await
            .unwrap();

        let w = cached(&sync);
        assert_eq!(w.exercises[0].superset_with, Some(EntityId::Int(12)));
        assert_eq!(w.exercises[2].superset_with, Some(EntityId::Int(10)));
        w.validate_supersets().unwrap();
    }

    #[tokio::test]
    async fn self_pairing_fails_before_io() {
        let (transport, sync) = synchronizer();
        let err = sync
            .workouts()
            .pair_superset(&EntityId::Int(1), &EntityId::Int(10), &EntityId::Int(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Model(ModelError::SupersetSelf(_))));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn removing_paired_exercise_frees_partner() {
        let (transport, sync) = synchronizer();
        let mut w = workout();
        w["exercises"][0]["is_superset"] = json!(true);
        w["exercises"][0]["superset_with"] = json!(11);
        w["exercises"][1]["is_superset"] = json!(true);
        w["exercises"][1]["superset_with"] = json!(10);
        seed(&sync, &detail_key(&EntityId::Int(1)), w);
        transport.respond(HttpMethod::Delete, "/workouts/1/exercises/11/", json!(null));

        sync.workouts()
            .remove_exercise(&EntityId::Int(1), &EntityId::Int(11))
            .await
            .unwrap();

        let w = cached(&sync);
        assert_eq!(w.exercises.len(), 2);
        assert!(!w.exercises[0].is_superset);
        assert_eq!(w.exercises[1].order, 1);
    }

    #[tokio::test]
    async fn sets_must_match_effort() {
        let (transport, sync) = synchronizer();
        let timed = ExerciseSet {
            duration: Some(60),
            reps: Some(10),
            ..ExerciseSet::default()
        };
        let err = sync
            .workouts()
            .update_sets(&EntityId::Int(1), &EntityId::Int(10), EffortType::Time, &[timed])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Model(ModelError::SetFieldsMismatch { index: 0, .. })
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn updated_sets_are_cached() {
        let (transport, sync) = synchronizer();
        seed(&sync, &detail_key(&EntityId::Int(1)), workout());
        transport.respond(HttpMethod::Put, "/workouts/1/exercises/11/sets/", json!(null));
        let plank = ExerciseSet {
            duration: Some(45),
            ..ExerciseSet::default()
        };

        sync.workouts()
            .update_sets(&EntityId::Int(1), &EntityId::Int(11), EffortType::Time, &[plank])
            .await
            .unwrap();

        let w = cached(&sync);
        assert_eq!(w.exercises[1].effort_type, EffortType::Time);
        assert_eq!(w.exercises[1].sets[0].duration, Some(45));
    }

    #[tokio::test]
    async fn stale_workout_still_sends_the_delete() {
        let (transport, sync) = synchronizer();
        seed(&sync, &detail_key(&EntityId::Int(1)), workout());
        transport.respond(HttpMethod::Delete, "/workouts/1/exercises/13/", json!(null));

        // exercise 13 was added elsewhere and is not in the cached copy
        sync.workouts()
            .remove_exercise(&EntityId::Int(1), &EntityId::Int(13))
            .await
            .unwrap();

        assert_eq!(transport.calls_to(HttpMethod::Delete, "/workouts/1/exercises/13/"), 1);
        let entry = sync.cache().get(&detail_key(&EntityId::Int(1))).unwrap();
        assert!(entry.invalidated);
        assert_eq!(entry.data, workout());
    }

    #[tokio::test]
    async fn partial_reorder_of_a_stale_workout_is_sent() {
        let (transport, sync) = synchronizer();
        let mut w = workout();
        w["exercises"].as_array_mut().unwrap().truncate(2);
        seed(&sync, &detail_key(&EntityId::Int(1)), w);
        transport.respond(HttpMethod::Post, "/workouts/1/reorder-exercises/", json!(null));

        let order = [EntityId::Int(12), EntityId::Int(11), EntityId::Int(10)];
        sync.workouts()
            .reorder_exercises(&EntityId::Int(1), &order)
            .await
            .unwrap();

        assert_eq!(transport.calls_to(HttpMethod::Post, "/workouts/1/reorder-exercises/"), 1);
        assert!(sync.cache().get(&detail_key(&EntityId::Int(1))).unwrap().invalidated);
    }

    #[tokio::test]
    async fn duplicate_ids_in_reorder_fail_before_io() {
        let (transport, sync) = synchronizer();
        seed(&sync, &detail_key(&EntityId::Int(1)), workout());

        let order = [EntityId::Int(10), EntityId::Int(10), EntityId::Int(11)];
        let err = sync
            .workouts()
            .reorder_exercises(&EntityId::Int(1), &order)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Model(ModelError::ReorderMismatch)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn sets_for_an_uncached_exercise_invalidate_the_workout() {
        let (transport, sync) = synchronizer();
        seed(&sync, &detail_key(&EntityId::Int(1)), workout());
        transport.respond(HttpMethod::Put, "/workouts/1/exercises/13/sets/", json!(null));
        let set = ExerciseSet {
            reps: Some(8),
            weight: Some(60.0),
            ..ExerciseSet::default()
        };

        sync.workouts()
            .update_sets(&EntityId::Int(1), &EntityId::Int(13), EffortType::Reps, &[set])
            .await
            .unwrap();

        assert!(sync.cache().get(&detail_key(&EntityId::Int(1))).unwrap().invalidated);
    }
}
