//! Canonical CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::cmp::Ordering;

/// Upper bound on array and map element counts accepted from input.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Upper bound on byte and text string lengths accepted from input.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// Decodes exactly one canonical value from `bytes`.
///
/// # Errors
///
/// Fails on malformed input, non-canonical heads or map order, indefinite
/// lengths, half-precision or NaN floats, and trailing bytes.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes(decoder.remaining()));
    }
    Ok(value)
}

/// A decoder that rejects anything the canonical encoder would not emit.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Creates a decoder over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns true when all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Decodes the next value.
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial = self.read_byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;

        match major {
            0 => {
                let n = self.read_arg(info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::IntegerOverflow(n))
            }
            1 => {
                let n = self.read_arg(info)?;
                if n > i64::MAX as u64 {
                    return Err(CodecError::IntegerOverflow(n));
                }
                Ok(Value::Integer(-1 - n as i64))
            }
            2 => {
                let len = self.read_len(info, MAX_BYTES_LENGTH)?;
                Ok(Value::Bytes(self.read_slice(len)?.to_vec()))
            }
            3 => {
                let len = self.read_len(info, MAX_BYTES_LENGTH)?;
                let bytes = self.read_slice(len)?;
                let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_string()))
            }
            4 => {
                let len = self.read_len(info, MAX_CONTAINER_ELEMENTS)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.decode()?);
                }
                Ok(Value::Array(items))
            }
            5 => self.decode_map(info),
            6 => Err(CodecError::unsupported_type("tagged item")),
            _ => self.decode_simple(info),
        }
    }

    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    fn read_arg(&mut self, info: u8) -> CodecResult<u64> {
        let (value, shorter_fits) = match info {
            0..=23 => return Ok(u64::from(info)),
            24 => {
                let v = u64::from(self.read_byte()?);
                (v, v < 24)
            }
            25 => {
                let v = u64::from(u16::from_be_bytes(self.read_array()?));
                (v, v <= 0xff)
            }
            26 => {
                let v = u64::from(u32::from_be_bytes(self.read_array()?));
                (v, v <= 0xffff)
            }
            27 => {
                let v = u64::from_be_bytes(self.read_array()?);
                (v, v <= 0xffff_ffff)
            }
            31 => return Err(CodecError::IndefiniteLengthForbidden),
            _ => return Err(CodecError::invalid_structure("reserved additional info")),
        };
        if shorter_fits {
            return Err(CodecError::invalid_structure(
                "non-canonical: argument could use a shorter head",
            ));
        }
        Ok(value)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_len(&mut self, info: u8, max_allowed: u64) -> CodecResult<usize> {
        let claimed = self.read_arg(info)?;
        if claimed > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            });
        }
        Ok(claimed as usize)
    }

    fn decode_map(&mut self, info: u8) -> CodecResult<Value> {
        let len = self.read_len(info, MAX_CONTAINER_ELEMENTS)?;
        let mut pairs = Vec::with_capacity(len.min(1024));
        let data: &'a [u8] = self.data;
        let mut prev_key: Option<&'a [u8]> = None;

        for _ in 0..len {
            let start = self.pos;
            let key = self.decode()?;
            let key_bytes = &data[start..self.pos];

            if let Some(prev) = prev_key {
                let order = prev.len().cmp(&key_bytes.len()).then_with(|| prev.cmp(key_bytes));
                if order != Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: map keys not strictly ascending",
                    ));
                }
            }
            prev_key = Some(key_bytes);

            let value = self.decode()?;
            pairs.push((key, value));
        }

        Ok(Value::Map(pairs))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn decode_simple(&mut self, info: u8) -> CodecResult<Value> {
        match info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25 => Err(CodecError::unsupported_type("half-precision float")),
            26 => {
                let x = f32::from_be_bytes(self.read_array()?);
                Value::float(f64::from(x))
            }
            27 => {
                let x = f64::from_be_bytes(self.read_array()?);
                if f64::from(x as f32).to_bits() == x.to_bits() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: float fits single precision",
                    ));
                }
                Value::float(x)
            }
            31 => Err(CodecError::invalid_structure("break outside indefinite item")),
            other => Err(CodecError::unsupported_type(format!("simple value {other}"))),
        }
    }
}
