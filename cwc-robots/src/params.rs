//! Named command parameters with typed, range-checked accessors
//!
//! Parameters arrive as a JSON object. A missing key or an explicit `null`
//! takes the documented default; anything that cannot be represented in the
//! target wire field is rejected with an [`EncodingError`].

use serde_json::{Map, Value};

use crate::error::EncodingError;

pub const BYTE_RANGE: (i64, i64) = (-128, 255);
pub const SHORT_RANGE: (i64, i64) = (-32768, 65535);
pub const INT_RANGE: (i64, i64) = (i32::MIN as i64, u32::MAX as i64);

fn check(name: &'static str, value: i64, (min, max): (i64, i64)) -> Result<i64, EncodingError> {
    if value < min || value > max {
        return Err(EncodingError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// Value as the low 8 bits of a byte field (signed or unsigned)
pub fn byte(name: &'static str, value: i64) -> Result<u8, EncodingError> {
    check(name, value, BYTE_RANGE).map(|v| (v & 0xFF) as u8)
}

/// Value as the bits of a 16-bit field (signed or unsigned)
pub fn short(name: &'static str, value: i64) -> Result<u16, EncodingError> {
    check(name, value, SHORT_RANGE).map(|v| (v & 0xFFFF) as u16)
}

/// Value as the bits of a 32-bit field (signed or unsigned)
pub fn int(name: &'static str, value: i64) -> Result<u32, EncodingError> {
    check(name, value, INT_RANGE).map(|v| (v & 0xFFFF_FFFF) as u32)
}

/// Parameter object of one command call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; `null` is an empty parameter set
    pub fn from_value(value: Value) -> Result<Self, EncodingError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            _ => Err(EncodingError::InvalidType {
                name: "params",
                expected: "an object",
            }),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Raw value, with `null` treated as absent
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn f64(&self, key: &'static str) -> Result<Option<f64>, EncodingError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n.as_f64().map(Some).ok_or(EncodingError::InvalidType {
                name: key,
                expected: "a number",
            }),
            Some(Value::Bool(b)) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Some(_) => Err(EncodingError::InvalidType {
                name: key,
                expected: "a number",
            }),
        }
    }

    /// Integer value; fractions are truncated toward zero
    pub fn i64(&self, key: &'static str) -> Result<Option<i64>, EncodingError> {
        match self.f64(key)? {
            None => Ok(None),
            Some(v) if v.is_finite() => Ok(Some(v.trunc() as i64)),
            Some(_) => Err(EncodingError::InvalidType {
                name: key,
                expected: "a finite number",
            }),
        }
    }

    pub fn i64_or(&self, key: &'static str, default: i64) -> Result<i64, EncodingError> {
        Ok(self.i64(key)?.unwrap_or(default))
    }

    pub fn require_i64(&self, key: &'static str) -> Result<i64, EncodingError> {
        self.i64(key)?.ok_or(EncodingError::MissingParameter(key))
    }

    pub fn f64_or(&self, key: &'static str, default: f64) -> Result<f64, EncodingError> {
        Ok(self.f64(key)?.unwrap_or(default))
    }

    pub fn byte_or(&self, key: &'static str, default: i64) -> Result<u8, EncodingError> {
        byte(key, self.i64_or(key, default)?)
    }

    pub fn short_or(&self, key: &'static str, default: i64) -> Result<u16, EncodingError> {
        short(key, self.i64_or(key, default)?)
    }

    pub fn int_or(&self, key: &'static str, default: i64) -> Result<u32, EncodingError> {
        int(key, self.i64_or(key, default)?)
    }

    /// Integer clamped into `min..=max`
    pub fn clamped_or(
        &self,
        key: &'static str,
        default: i64,
        min: i64,
        max: i64,
    ) -> Result<i64, EncodingError> {
        Ok(self.i64_or(key, default)?.clamp(min, max))
    }

    /// Booleans, or numbers where non-zero is true
    pub fn bool_or(&self, key: &'static str, default: bool) -> Result<bool, EncodingError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
            Some(_) => Err(EncodingError::InvalidType {
                name: key,
                expected: "a boolean",
            }),
        }
    }

    pub fn str(&self, key: &'static str) -> Result<Option<&str>, EncodingError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(EncodingError::InvalidType {
                name: key,
                expected: "a string",
            }),
        }
    }

    pub fn require_str(&self, key: &'static str) -> Result<&str, EncodingError> {
        self.str(key)?.ok_or(EncodingError::MissingParameter(key))
    }

    /// A single integer or a list of integers
    pub fn int_list(&self, key: &'static str) -> Result<Option<Vec<i64>>, EncodingError> {
        let invalid = EncodingError::InvalidType {
            name: key,
            expected: "a list of integers",
        };
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_f64()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                        .ok_or_else(|| invalid.clone())
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(Value::Number(_)) => Ok(Some(vec![self.require_i64(key)?])),
            Some(_) => Err(invalid),
        }
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
