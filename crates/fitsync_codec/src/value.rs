//! Canonical value type.

use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A finite float that participates in equality and hashing.
///
/// NaN is rejected on construction and `-0.0` is folded into `0.0`, so two
/// floats compare equal exactly when their canonical encodings are equal.
#[derive(Debug, Clone, Copy)]
pub struct Float(f64);

impl Float {
    /// Wraps a float, rejecting NaN.
    pub fn new(value: f64) -> CodecResult<Self> {
        if value.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        Ok(Self(if value == 0.0 { 0.0 } else { value }))
    }

    /// Returns the wrapped value.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Float {}

impl Hash for Float {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// A dynamic value with a single canonical form.
///
/// Maps built through [`Value::map`] or [`Value::from_json`] keep their
/// entries sorted by canonical key encoding, so structural equality and
/// hashing agree with the canonical byte encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Finite float.
    Float(Float),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string.
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map entries in canonical key order.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Creates a map value with canonically sorted keys.
    ///
    /// When a key occurs more than once the last entry wins.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        let mut pairs: Vec<(Value, Value)> = pairs.into_iter().rev().collect();
        // stable sort keeps the last inserted duplicate first, dedup keeps it
        pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
        pairs.dedup_by(|later, earlier| later.0 == earlier.0);
        Value::Map(pairs)
    }

    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Creates a float value, rejecting NaN.
    pub fn float(f: f64) -> CodecResult<Self> {
        Float::new(f).map(Value::Float)
    }

    /// Converts a JSON document into its canonical value.
    ///
    /// Object members are sorted canonically, so two documents that differ
    /// only in member order produce equal values.
    pub fn from_json(json: &serde_json::Value) -> CodecResult<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    return Err(CodecError::IntegerOverflow(u));
                } else {
                    Value::float(n.as_f64().unwrap_or(f64::NAN))?
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<CodecResult<_>>()?,
            ),
            serde_json::Value::Object(members) => {
                let mut pairs = Vec::with_capacity(members.len());
                for (k, v) in members {
                    pairs.push((Value::Text(k.clone()), Value::from_json(v)?));
                }
                Value::map(pairs)
            }
        })
    }

    /// Compares two values by their canonical encodings.
    ///
    /// Shorter encodings sort first; equal lengths compare bytewise.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let a = to_canonical_cbor(self);
        let b = to_canonical_cbor(other);
        a.len().cmp(&b.len()).then_with(|| a.cmp(&b))
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes, if this is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the array items, if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a text key in a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", x.get()),
            Value::Bytes(b) => {
                f.write_str("h'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_keys_sort_length_first() {
        let map = Value::map(vec![
            (Value::text("abc"), Value::Integer(1)),
            (Value::text("z"), Value::Integer(2)),
            (Value::text("ab"), Value::Integer(3)),
        ]);

        let Value::Map(pairs) = map else {
            panic!("expected map");
        };
        let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_text().unwrap()).collect();
        assert_eq!(keys, vec!["z", "ab", "abc"]);
    }

    #[test]
    fn duplicate_keys_keep_last() {
        let map = Value::map(vec![
            (Value::text("page"), Value::Integer(1)),
            (Value::text("page"), Value::Integer(2)),
        ]);
        assert_eq!(map.get("page"), Some(&Value::Integer(2)));
        assert!(matches!(map, Value::Map(ref p) if p.len() == 1));
    }

    #[test]
    fn json_member_order_does_not_matter() {
        let a = json!({"user": 7, "scope": "friends", "page": 2});
        let b = json!({"page": 2, "user": 7, "scope": "friends"});
        assert_eq!(
            Value::from_json(&a).unwrap(),
            Value::from_json(&b).unwrap()
        );
    }

    #[test]
    fn json_numbers() {
        assert_eq!(Value::from_json(&json!(5)).unwrap(), Value::Integer(5));
        assert_eq!(
            Value::from_json(&json!(51.5)).unwrap(),
            Value::float(51.5).unwrap()
        );
        assert_eq!(
            Value::from_json(&json!(u64::MAX)),
            Err(CodecError::IntegerOverflow(u64::MAX))
        );
    }

    #[test]
    fn negative_zero_folds() {
        assert_eq!(Value::float(-0.0).unwrap(), Value::float(0.0).unwrap());
        assert_eq!(Value::float(f64::NAN), Err(CodecError::NaNForbidden));
    }

    #[test]
    fn display_is_compact() {
        let v = Value::from_json(&json!({"q": "bench", "ids": [1, 2]})).unwrap();
        assert_eq!(v.to_string(), r#"{"q":"bench","ids":[1,2]}"#);
    }
}
