//! Canonical CBOR encoder.

use crate::value::Value;

/// Encodes a value to canonical CBOR bytes.
///
/// Output is deterministic:
/// - map keys are written sorted by their encoded form (length-first, then bytewise)
/// - integers and lengths use the shortest head
/// - floats use single precision when that round-trips exactly, double otherwise
/// - no indefinite-length items
pub fn to_canonical_cbor(value: &Value) -> Vec<u8> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value);
    encoder.into_bytes()
}

/// A canonical CBOR encoder writing into an owned buffer.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends one value.
    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(false) => self.buffer.push(0xf4),
            Value::Bool(true) => self.buffer.push(0xf5),
            Value::Integer(n) => self.write_integer(*n),
            Value::Float(x) => self.write_float(x.get()),
            Value::Bytes(b) => {
                self.write_head(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.write_head(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.write_head(4, items.len() as u64);
                for item in items {
                    self.encode(item);
                }
            }
            Value::Map(pairs) => self.write_map(pairs),
        }
    }

    /// Consumes the encoder and returns the bytes written.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_head(0, n as u64);
        } else {
            // major type 1 carries -1 - n
            self.write_head(1, (-(n + 1)) as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_float(&mut self, x: f64) {
        let single = x as f32;
        if f64::from(single).to_bits() == x.to_bits() {
            self.buffer.push(0xfa);
            self.buffer.extend_from_slice(&single.to_be_bytes());
        } else {
            self.buffer.push(0xfb);
            self.buffer.extend_from_slice(&x.to_be_bytes());
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_head(&mut self, major: u8, arg: u64) {
        let mt = major << 5;
        match arg {
            0..=23 => self.buffer.push(mt | arg as u8),
            24..=0xff => {
                self.buffer.push(mt | 24);
                self.buffer.push(arg as u8);
            }
            0x100..=0xffff => {
                self.buffer.push(mt | 25);
                self.buffer.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buffer.push(mt | 26);
                self.buffer.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.buffer.push(mt | 27);
                self.buffer.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    fn write_map(&mut self, pairs: &[(Value, Value)]) {
        // Re-sort on encode so hand-built Value::Map still encodes canonically.
        let mut encoded: Vec<(Vec<u8>, &Value)> = pairs
            .iter()
            .map(|(k, v)| (to_canonical_cbor(k), v))
            .collect();
        encoded.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));

        self.write_head(5, pairs.len() as u64);
        for (key, value) in encoded {
            self.buffer.extend_from_slice(&key);
            self.encode(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_values() {
        assert_eq!(to_canonical_cbor(&Value::Null), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(false)), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)), vec![0xf5]);
    }

    #[test]
    fn integer_heads_are_shortest() {
        assert_eq!(to_canonical_cbor(&Value::Integer(23)), vec![0x17]);
        assert_eq!(to_canonical_cbor(&Value::Integer(24)), vec![0x18, 24]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(256)),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(65536)),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)), vec![0x20]);
        assert_eq!(to_canonical_cbor(&Value::Integer(-100)), vec![0x38, 99]);
    }

    #[test]
    fn floats_prefer_single_precision() {
        assert_eq!(
            to_canonical_cbor(&Value::float(1.5).unwrap()),
            vec![0xfa, 0x3f, 0xc0, 0x00, 0x00]
        );
        let bytes = to_canonical_cbor(&Value::float(0.1).unwrap());
        assert_eq!(bytes[0], 0xfb);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn text_and_bytes() {
        assert_eq!(to_canonical_cbor(&Value::text("")), vec![0x60]);
        assert_eq!(to_canonical_cbor(&Value::text("a")), vec![0x61, b'a']);
        assert_eq!(
            to_canonical_cbor(&Value::Bytes(vec![1, 2, 3])),
            vec![0x43, 1, 2, 3]
        );
    }

    #[test]
    fn unsorted_map_encodes_sorted() {
        let map = Value::Map(vec![
            (Value::text("bb"), Value::Integer(2)),
            (Value::text("a"), Value::Integer(1)),
        ]);
        assert_eq!(
            to_canonical_cbor(&map),
            vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]
        );
    }
}
