//! Property-based test generators using proptest.
//!
//! Strategies for filters, record lists and counter deltas that keep the
//! shapes the cache relies on: records carry an `id`, filter values are
//! JSON scalars, counters are non-negative.

use fitsync_protocol::EntityId;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Strategy for entity ids, integer or string.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop_oneof![
        (1i64..10_000).prop_map(EntityId::Int),
        prop::string::string_regex("[a-z]{1,4}-[0-9]{1,4}")
            .expect("Invalid regex")
            .prop_map(EntityId::Str),
    ]
}

/// Strategy for a single filter value.
pub fn filter_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        (-1000i64..1000).prop_map(Value::from),
        prop::string::string_regex("[a-z ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Strategy for a filter as `(field, value)` pairs with distinct fields.
///
/// Pair order is arbitrary; use [`filter_map`] with a permutation to build
/// the same filter with its fields inserted in a different order.
pub fn filter_pairs_strategy() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z_]{1,10}").expect("Invalid regex"),
        filter_value_strategy(),
        0..6,
    )
    .prop_map(|fields| fields.into_iter().collect())
}

/// A filter and a shuffled copy of its pairs.
pub fn shuffled_filter_strategy() -> impl Strategy<Value = (Vec<(String, Value)>, Vec<(String, Value)>)>
{
    filter_pairs_strategy().prop_flat_map(|pairs| {
        let shuffled = Just(pairs.clone()).prop_shuffle();
        (Just(pairs), shuffled)
    })
}

/// Builds a JSON object inserting fields in the given order.
pub fn filter_map(pairs: &[(String, Value)]) -> Value {
    let mut map = Map::new();
    for (field, value) in pairs {
        map.insert(field.clone(), value.clone());
    }
    Value::Object(map)
}

/// Strategy for a list of records with distinct integer ids.
pub fn record_list_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::btree_set(1i64..500, 0..12).prop_map(|ids| {
        ids.into_iter()
            .map(|id| {
                json!({
                    "id": id,
                    "user": {"id": 1, "username": "ana"},
                    "likes_count": id % 7,
                    "is_liked": id % 2 == 0
                })
            })
            .collect()
    })
}

/// Strategy for a starting counter value and a sequence of deltas.
pub fn counter_deltas_strategy() -> impl Strategy<Value = (u64, Vec<i64>)> {
    (0u64..50, prop::collection::vec(-20i64..20, 1..20))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn shuffled_filters_hold_the_same_pairs((pairs, shuffled) in shuffled_filter_strategy()) {
            prop_assert_eq!(filter_map(&pairs), filter_map(&shuffled));
        }

        #[test]
        fn record_lists_have_distinct_ids(records in record_list_strategy()) {
            let mut ids: Vec<_> = records.iter().map(|r| r["id"].clone()).collect();
            let len = ids.len();
            ids.dedup();
            prop_assert_eq!(ids.len(), len);
        }
    }
}
