//! # fitsync codec
//!
//! Canonical values and canonical CBOR for fitsync.
//!
//! Cache keys are compared, hashed and persisted through this crate, so the
//! encoding must be deterministic:
//! - identical logical inputs produce identical bytes
//! - map member order never affects the result
//! - NaN is rejected and `-0.0` folds into `0.0`
//!
//! ## Usage
//!
//! ```
//! use fitsync_codec::{from_cbor, to_canonical_cbor, Value};
//!
//! let filter = serde_json::json!({"scope": "friends", "page": 1});
//! let value = Value::from_json(&filter).unwrap();
//! let bytes = to_canonical_cbor(&value);
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::{Float, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shuffled_members() -> impl Strategy<Value = (Vec<(String, i64)>, Vec<usize>)> {
        prop::collection::btree_map("[a-z_]{1,12}", any::<i64>(), 1..8)
            .prop_map(|m| m.into_iter().collect::<Vec<_>>())
            .prop_flat_map(|members| {
                let n = members.len();
                (
                    Just(members),
                    Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
                )
            })
    }

    proptest! {
        #[test]
        fn member_order_never_changes_encoding((members, order) in shuffled_members()) {
            let forward = Value::map(
                members.iter().map(|(k, v)| (Value::text(k.clone()), Value::Integer(*v))).collect(),
            );
            let permuted = Value::map(
                order.iter().map(|&i| {
                    let (k, v) = &members[i];
                    (Value::text(k.clone()), Value::Integer(*v))
                }).collect(),
            );
            prop_assert_eq!(&forward, &permuted);
            prop_assert_eq!(to_canonical_cbor(&forward), to_canonical_cbor(&permuted));
        }

        #[test]
        fn encoded_values_decode_back(n in any::<i64>(), s in ".{0,40}", x in -1.0e9f64..1.0e9) {
            let value = Value::Array(vec![
                Value::Integer(n),
                Value::text(s),
                Value::float(x).unwrap(),
            ]);
            prop_assert_eq!(from_cbor(&to_canonical_cbor(&value)).unwrap(), value);
        }
    }
}
