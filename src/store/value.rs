//! Store-native property values.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::types::{Identifier, Key};

/// A property value as the entity store understands it.
///
/// `DateTime` is what callers hand to the store; the store hands back
/// `Timestamp`, which carries a timezone (always UTC).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Key(Key),
    Array(Vec<Value>),
    /// An embedded entity (nested mapping without its own key).
    Entity(BTreeMap<String, Value>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::DateTime(_) => "datetime",
            Value::Timestamp(_) => "timestamp",
            Value::Key(_) => "key",
            Value::Array(_) => "array",
            Value::Entity(_) => "entity",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Interpret the value as a key identifier (integer or text).
    pub fn to_identifier(&self) -> Option<Identifier> {
        match self {
            Value::Integer(i) => Some(Identifier::Id(*i)),
            Value::Text(s) => Some(Identifier::Name(s.clone())),
            Value::Key(k) => k.id_or_name().cloned(),
            _ => None,
        }
    }

    /// Rank of the value's type in the store's cross-type ordering.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Float(_) => 1,
            Value::DateTime(_) | Value::Timestamp(_) => 2,
            Value::Bool(_) => 3,
            Value::Text(_) => 4,
            Value::Blob(_) => 5,
            Value::Key(_) => 6,
            Value::Array(_) => 7,
            Value::Entity(_) => 8,
        }
    }

    /// Total ordering used for sorting and range comparisons.
    ///
    /// Values of different types order by type rank. Integers and floats
    /// compare numerically; naive datetimes compare as UTC.
    ///
    /// Range filters use the same order, so `> 1` also matches any value
    /// whose type ranks above numbers, such as text.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            (Value::DateTime(_) | Value::Timestamp(_), Value::DateTime(_) | Value::Timestamp(_)) => {
                self.as_utc().cmp(&other.as_utc())
            }
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            (Value::Key(a), Value::Key(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Entity(a), Value::Entity(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn as_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(naive) => Some(naive.and_utc()),
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Convert a JSON literal into a store value.
    ///
    /// JSON objects become embedded entities; integral numbers become
    /// `Integer`, everything else numeric becomes `Float`.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Entity(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Key(key) => write!(f, "{}", key),
            Value::Array(items) => write!(f, "[{} items]", items.len()),
            Value::Entity(map) => write!(f, "{{{} properties}}", map.len()),
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
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
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

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Blob(bytes)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Value::Key(key)
    }
}

impl From<Identifier> for Value {
    fn from(identifier: Identifier) -> Self {
        match identifier {
            Identifier::Id(id) => Value::Integer(id),
            Identifier::Name(name) => Value::Text(name),
        }
    }
}
