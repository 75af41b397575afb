//! In-memory field values of documents.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::document::{Document, Reference};
use crate::store::Identifier;

/// A document field value.
///
/// Datetimes are timezone-naive. `Opaque` holds the in-memory form of a
/// bytes field, which is serialized to a blob when stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
    List(Vec<FieldValue>),
    Dict(BTreeMap<String, FieldValue>),
    Embedded(Box<Document>),
    Reference(Reference),
    Opaque(serde_json::Value),
}

impl FieldValue {
    /// Wrap any serializable value for a bytes field.
    pub fn opaque<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(FieldValue::Opaque(serde_json::to_value(value)?))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::List(_) => "list",
            FieldValue::Dict(_) => "dict",
            FieldValue::Embedded(_) => "embedded document",
            FieldValue::Reference(_) => "reference",
            FieldValue::Opaque(_) => "opaque",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Check if the value holds only scalars, lists and dicts.
    pub fn is_plain(&self) -> bool {
        match self {
            FieldValue::List(items) => items.iter().all(FieldValue::is_plain),
            FieldValue::Dict(map) => map.values().all(FieldValue::is_plain),
            FieldValue::Embedded(_) | FieldValue::Reference(_) | FieldValue::Opaque(_) => false,
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, integers included.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            FieldValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Dict(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_embedded(&self) -> Option<&Document> {
        match self {
            FieldValue::Embedded(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            FieldValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_reference_mut(&mut self) -> Option<&mut Reference> {
        match self {
            FieldValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Deserialize the content of a bytes field.
    pub fn decode_opaque<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        match self {
            FieldValue::Opaque(json) => Some(serde_json::from_value(json.clone())),
            _ => None,
        }
    }

    /// Integer and string values double as identifiers.
    pub fn to_identifier(&self) -> Option<Identifier> {
        match self {
            FieldValue::Integer(i) => Some(Identifier::Id(*i)),
            FieldValue::String(s) => Some(Identifier::Name(s.clone())),
            _ => None,
        }
    }

    /// Length of strings (in characters), lists and dicts.
    pub fn len(&self) -> Option<usize> {
        match self {
            FieldValue::String(s) => Some(s.chars().count()),
            FieldValue::List(items) => Some(items.len()),
            FieldValue::Dict(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Ordering between comparable values: numbers, datetimes, strings.
    pub fn partial_compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Integer(_) | FieldValue::Float(_), FieldValue::Integer(_) | FieldValue::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => Some(a.cmp(b)),
            (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Convert a JSON literal into a plain value; objects become dicts.
    pub fn from_json(json: &serde_json::Value) -> FieldValue {
        match json {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => FieldValue::String(s.clone()),
            serde_json::Value::Array(items) => FieldValue::List(items.iter().map(FieldValue::from_json).collect()),
            serde_json::Value::Object(map) => FieldValue::Dict(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::DateTime(dt) => write!(f, "{}", dt),
            FieldValue::List(items) => write!(f, "[{} items]", items.len()),
            FieldValue::Dict(map) => write!(f, "{{{} entries}}", map.len()),
            FieldValue::Embedded(doc) => write!(f, "<{}>", doc.document_type().name()),
            FieldValue::Reference(r) => write!(f, "{}", r),
            FieldValue::Opaque(json) => write!(f, "{}", json),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(dt: NaiveDateTime) -> Self {
        FieldValue::DateTime(dt)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, FieldValue>> for FieldValue {
    fn from(map: BTreeMap<String, FieldValue>) -> Self {
        FieldValue::Dict(map)
    }
}

impl From<Document> for FieldValue {
    fn from(doc: Document) -> Self {
        FieldValue::Embedded(Box::new(doc))
    }
}

impl From<Reference> for FieldValue {
    fn from(r: Reference) -> Self {
        FieldValue::Reference(r)
    }
}

impl From<Identifier> for FieldValue {
    fn from(identifier: Identifier) -> Self {
        match identifier {
            Identifier::Id(id) => FieldValue::Integer(id),
            Identifier::Name(name) => FieldValue::String(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_plain() {
        assert!(FieldValue::from_json(&json!({"a": [1, 2.5, "x"]})).is_plain());
        assert!(!FieldValue::Opaque(json!(1)).is_plain());
        assert!(!FieldValue::List(vec![FieldValue::Opaque(json!(1))]).is_plain());
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            FieldValue::Integer(2).partial_compare(&FieldValue::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(FieldValue::from("b").partial_compare(&"a".into()), Some(Ordering::Greater));
        assert_eq!(FieldValue::from("b").partial_compare(&FieldValue::Integer(1)), None);
    }

    #[test]
    fn test_opaque() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Weights {
            layers: Vec<f64>,
            name: String,
        }

        let weights = Weights {
            layers: vec![0.5, 1.5],
            name: "w".into(),
        };
        let value = FieldValue::opaque(&weights).unwrap();
        let back: Weights = value.decode_opaque().unwrap().unwrap();
        assert_eq!(back, weights);
        assert!(FieldValue::Integer(1).decode_opaque::<Weights>().is_none());
    }

    #[test]
    fn test_identifier_conversion() {
        assert_eq!(FieldValue::Integer(4).to_identifier(), Some(Identifier::Id(4)));
        assert_eq!(FieldValue::from(Identifier::from("x")), FieldValue::String("x".into()));
        assert_eq!(FieldValue::Float(1.0).to_identifier(), None);
    }
}
