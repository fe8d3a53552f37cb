//! Host-native value representation and the conversion boundary.
//!
//! Script values crossing into the host are converted exactly once, here,
//! into [`Value`]. Downstream components (flag binding, cache, templates)
//! only ever see typed native values and never re-inspect loosely-typed
//! data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A host-native value bridged from the scripting side.
///
/// Only booleans, strings, integers, floats, ordered sequences, and
/// string-keyed mappings are representable. Callables are never bridged as
/// data; they are held as opaque [`ActionHandle`](crate::ActionHandle)s.
///
/// # Examples
///
/// ```
/// use chore_core::Value;
///
/// let v = Value::from(42);
/// assert_eq!(v.type_name(), "int");
/// assert_eq!(v.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// String-keyed mapping with deterministic iteration order.
    Map(BTreeMap<String, Value>),
}

/// Conversion into [`Value`] failed.
///
/// Always names the offending type so script errors point at the actual
/// value that could not cross the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The source type has no native representation (e.g. `None`, a set,
    /// an opaque object).
    #[error("cannot convert script value of type `{0}`")]
    Unsupported(String),
    /// An integer does not fit in 64 signed bits.
    #[error("integer out of range for 64-bit value: {0}")]
    IntOutOfRange(String),
    /// A mapping key is not a string.
    #[error("mapping key must be a string, got `{0}`")]
    NonStringKey(String),
}

impl Value {
    /// Name of this value's type, as surfaced in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Converts a JSON value into a native value.
    ///
    /// `null` is not representable and integers beyond the `i64` range are
    /// rejected rather than silently losing precision.
    ///
    /// # Examples
    ///
    /// ```
    /// use chore_core::Value;
    ///
    /// let v = Value::from_json(serde_json::json!({"a": [1, true]})).unwrap();
    /// assert_eq!(v.type_name(), "map");
    /// assert!(Value::from_json(serde_json::Value::Null).is_err());
    /// ```
    pub fn from_json(json: serde_json::Value) -> Result<Self, ConversionError> {
        match json {
            serde_json::Value::Null => {
                Err(ConversionError::Unsupported("null".to_string()))
            }
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(ConversionError::IntOutOfRange(n.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Array(items) => {
                let list = items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(list))
            }
            serde_json::Value::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key, Value::from_json(value)?);
                }
                Ok(Value::Map(map))
            }
        }
    }

    /// Converts this value into JSON. Infallible: every native value has a
    /// JSON representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Returns the string content if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean content if this is a bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer content if this is an int value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Strings render raw; everything else renders as JSON. Used by
    /// template substitution and logging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.to_json().to_string()),
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

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
