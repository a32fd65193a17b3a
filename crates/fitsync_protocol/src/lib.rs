//! # fitsync protocol
//!
//! The data model of the fitness API and the REST calls the synchronizer
//! issues against it.
//!
//! This crate provides:
//! - [`EntityId`] and [`EntityKind`], the identity of every cached record
//! - typed records ([`model`]) with the client-side invariants: single post
//!   attachment, dense ordering, symmetric supersets, effort-typed sets
//! - [`ApiRequest`] descriptors and HTTP status classification
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod id;
mod kind;
pub mod model;
mod request;

pub use error::{ModelError, ModelResult};
pub use id::EntityId;
pub use kind::EntityKind;
pub use request::{classify_status, ApiRequest, HttpMethod, StatusClass};

#[cfg(test)]
mod tests {
    use super::model::Workout;
    use super::*;
    use proptest::prelude::*;

    fn workout_with(n: usize) -> Workout {
        let exercises: Vec<_> = (0..n)
            .map(|i| serde_json::json!({"id": i, "name": format!("ex{i}"), "order": i}))
            .collect();
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "w",
            "exercises": exercises
        }))
        .unwrap()
    }

    proptest! {
        #[test]
        fn reorder_yields_dense_orders(order in Just((0..6i64).collect::<Vec<_>>()).prop_shuffle()) {
            let mut w = workout_with(6);
            let ids: Vec<EntityId> = order.iter().copied().map(EntityId::Int).collect();
            w.reorder_exercises(&ids).unwrap();
            for (i, exercise) in w.exercises.iter().enumerate() {
                prop_assert_eq!(exercise.order as usize, i);
                prop_assert_eq!(&exercise.id, &ids[i]);
            }
        }

        #[test]
        fn pairing_any_two_stays_symmetric(a in 0..5i64, b in 0..5i64, c in 0..5i64) {
            prop_assume!(a != b && b != c);
            let mut w = workout_with(5);
            w.pair_superset(&EntityId::Int(a), &EntityId::Int(b)).unwrap();
            w.pair_superset(&EntityId::Int(b), &EntityId::Int(c)).unwrap();
            prop_assert!(w.validate_supersets().is_ok());
        }
    }
}
