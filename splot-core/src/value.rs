//! The dynamic value used by properties, the SAE stack, and wire payloads.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a property or SAE literal. `Value` itself only ever
/// holds an `i64` or an `f64`; the narrower integer/float variants here are
/// coercion *targets*, used to reject lossy conversions (`i64::MAX` into a
/// 32-bit slot) without inventing a second runtime representation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ValueType {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool,
    /// 32-bit signed integer (a coercion target, not a storage width).
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float (a coercion target).
    Float32,
    /// 64-bit float.
    Float64,
    /// UTF-8 text.
    Text,
    /// Byte string.
    Bytes,
    /// URI reference.
    Uri,
    /// Ordered array.
    Array,
    /// Text-keyed map.
    Map,
}

/// A tagged dynamic value: null, boolean, 64-bit integer, 64-bit float,
/// text, bytes, a URI reference, an ordered array, or a text-keyed map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE-754 double.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// URI reference, kept distinct from `Text` so wire codecs and resource
    /// links can tell a value apart from an address.
    Uri(String),
    /// Ordered array of values.
    Array(Vec<Value>),
    /// Text-keyed map of values. `BTreeMap` keeps snapshot output
    /// deterministic, which the section-collapse round-trip test depends on.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The `STOP` sentinel: the result of popping an empty stack at the end
    /// of SAE execution, meaning "suppress this propagation."
    ///
    /// Represented as a distinguished unit text value rather than a new
    /// enum variant, so every place that already matches on `Value` still
    /// compiles; callers that care check [`Value::is_stop`].
    pub const STOP_MARKER: &'static str = "\u{0}STOP\u{0}";

    /// Construct the `STOP` sentinel.
    pub fn stop() -> Value {
        Value::Text(Self::STOP_MARKER.to_owned())
    }

    /// True if this value is the `STOP` sentinel.
    pub fn is_stop(&self) -> bool {
        matches!(self, Value::Text(s) if s == Self::STOP_MARKER)
    }

    /// The declared type of this value, for diagnostics and wire framing.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int64,
            Value::Float(_) => ValueType::Float64,
            Value::Text(_) => ValueType::Text,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Uri(_) => ValueType::Uri,
            Value::Array(_) => ValueType::Array,
            Value::Map(_) => ValueType::Map,
        }
    }

    /// Coerce numerically to `f64`, following int/float interchange rules.
    pub fn as_f64(&self) -> Result<f64, CoreError> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(CoreError::InvalidValue(format!(
                "cannot coerce {other:?} to number"
            ))),
        }
    }

    /// Coerce to `bool` using the spec's threshold rule: for numbers,
    /// `x > 0 && x <= 1` is ambiguous at the boundary, so the concrete rule
    /// applied is a 0.5 threshold (`x >= 0.5` is true); for integers, any
    /// nonzero value is true.
    pub fn as_bool(&self) -> Result<bool, CoreError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f >= 0.5),
            other => Err(CoreError::InvalidValue(format!(
                "cannot coerce {other:?} to bool"
            ))),
        }
    }

    /// Coerce to `i64`. Floats truncate toward zero (`1.0 -> 1`, `0.1 ->
    /// 0`), matching the spec's worked coercion examples.
    pub fn as_i64(&self) -> Result<i64, CoreError> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Float(f) if f.is_finite() => Ok(*f as i64),
            Value::Bool(b) => Ok(if *b { 1 } else { 0 }),
            other => Err(CoreError::InvalidValue(format!(
                "cannot coerce {other:?} to integer"
            ))),
        }
    }

    /// Coerce to a target [`ValueType`], rejecting lossy narrowing the way
    /// the spec requires (e.g. `i64::MAX` into `Int32`).
    pub fn coerce(&self, target: ValueType) -> Result<Value, CoreError> {
        match target {
            ValueType::Null => Ok(Value::Null),
            ValueType::Bool => Ok(Value::Bool(self.as_bool()?)),
            ValueType::Int64 => Ok(Value::Int(self.as_i64()?)),
            ValueType::Int32 => {
                let i = self.as_i64()?;
                let narrowed = i32::try_from(i).map_err(|_| {
                    CoreError::InvalidValue(format!("{i} does not fit in a 32-bit integer"))
                })?;
                Ok(Value::Int(narrowed as i64))
            }
            ValueType::Float64 => Ok(Value::Float(self.as_f64()?)),
            ValueType::Float32 => {
                let f = self.as_f64()?;
                let narrowed = f as f32;
                if narrowed.is_finite() != f.is_finite() {
                    return Err(CoreError::InvalidValue(format!(
                        "{f} does not fit in a 32-bit float"
                    )));
                }
                Ok(Value::Float(narrowed as f64))
            }
            ValueType::Text => Ok(Value::Text(self.as_text()?)),
            ValueType::Bytes => match self {
                Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
                other => Err(CoreError::InvalidValue(format!(
                    "cannot coerce {other:?} to bytes"
                ))),
            },
            ValueType::Uri => match self {
                Value::Uri(u) => Ok(Value::Uri(u.clone())),
                Value::Text(t) => Ok(Value::Uri(t.clone())),
                other => Err(CoreError::InvalidValue(format!(
                    "cannot coerce {other:?} to uri"
                ))),
            },
            ValueType::Array => match self {
                Value::Array(a) => Ok(Value::Array(a.clone())),
                other => Err(CoreError::InvalidValue(format!(
                    "cannot coerce {other:?} to array"
                ))),
            },
            ValueType::Map => match self {
                Value::Map(m) => Ok(Value::Map(m.clone())),
                other => Err(CoreError::InvalidValue(format!(
                    "cannot coerce {other:?} to map"
                ))),
            },
        }
    }

    fn as_text(&self) -> Result<String, CoreError> {
        match self {
            Value::Text(s) => Ok(s.clone()),
            Value::Uri(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            other => Err(CoreError::InvalidValue(format!(
                "cannot coerce {other:?} to text"
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Uri(u) => write!(f, "{u}"),
            Value::Array(a) => write!(f, "{a:?}"),
            Value::Map(m) => write!(f, "{m:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_rejects_overflowing_int32() {
        let v = Value::Int(i64::MAX);
        assert!(v.coerce(ValueType::Int32).is_err());
    }

    #[test]
    fn coerce_float_to_int_truncates() {
        assert_eq!(
            Value::Float(1.0).coerce(ValueType::Int64).unwrap().as_i64().unwrap(),
            1
        );
        assert_eq!(Value::Float(0.1).as_i64().unwrap(), 0);
    }

    #[test]
    fn float_to_bool_uses_half_threshold() {
        assert!(!Value::Float(0.1).as_bool().unwrap());
        assert!(Value::Float(0.5).as_bool().unwrap());
    }

    #[test]
    fn stop_sentinel_round_trips() {
        let s = Value::stop();
        assert!(s.is_stop());
        assert!(!Value::Text("STOP".to_owned()).is_stop());
    }
}
