//! Declarative filter expressions.
//!
//! A filter maps field names to conditions. A condition is either a bare
//! value (equality) or a set of `{operator: operand}` pairs such as
//! `{"$gte": 2.0}` or `{"$in": ["A", "B"]}`. Conditions on different fields
//! combine with AND.
//!
//! Operator names are kept as written; they are only resolved when the
//! filter is translated into native queries.

use std::fmt;

use super::error::{CollectionError, CollectionResult};
use crate::store::Value;

/// Condition on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value.
    Equals(Value),
    /// Each `(operator, operand)` pair must hold.
    Operators(Vec<(String, Value)>),
}

/// A filter expression: field conditions combined conjunctively, kept in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(field.into(), Condition::Equals(value.into()));
        self
    }

    /// Require `field <operator> operand`, e.g. `op("age", "$gte", 18)`.
    pub fn op(mut self, field: impl Into<String>, operator: impl Into<String>, operand: impl Into<Value>) -> Self {
        let pair = (operator.into(), operand.into());
        self.add(field.into(), Condition::Operators(vec![pair]));
        self
    }

    /// Require `field` to equal one of `values`.
    pub fn is_in<V: Into<Value>>(self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = Value::Array(values.into_iter().map(Into::into).collect());
        self.op(field, "$in", values)
    }

    /// Set the condition on `field`, replacing any previous one.
    pub fn with_condition(mut self, field: String, condition: Condition) -> Self {
        self.set(field, condition);
        self
    }

    pub fn set(&mut self, field: String, condition: Condition) {
        match self.conditions.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = condition,
            None => self.conditions.push((field, condition)),
        }
    }

    /// AND `condition` into the one already on `field`. A bare equality
    /// that gains a second constraint becomes an `$eq` pair.
    pub fn add(&mut self, field: String, condition: Condition) {
        let existing = match self.conditions.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => existing,
            None => {
                self.conditions.push((field, condition));
                return;
            }
        };
        let mut ops = match std::mem::replace(existing, Condition::Operators(Vec::new())) {
            Condition::Equals(value) => vec![("$eq".to_string(), value)],
            Condition::Operators(ops) => ops,
        };
        match condition {
            Condition::Equals(value) => ops.push(("$eq".to_string(), value)),
            Condition::Operators(more) => ops.extend(more),
        }
        *existing = Condition::Operators(ops);
    }

    /// Parse a MongoDB-style JSON filter.
    ///
    /// An object value whose keys all start with `$` is an operator mapping;
    /// any other value (including plain objects) is an equality operand.
    pub fn from_json(json: &serde_json::Value) -> CollectionResult<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| CollectionError::InvalidFilter("filter must be a JSON object".into()))?;

        let mut filter = Filter::new();
        for (field, domain) in object {
            let condition = match domain.as_object() {
                Some(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                    Condition::Operators(
                        ops.iter()
                            .map(|(op, operand)| (op.clone(), Value::from_json(operand)))
                            .collect(),
                    )
                }
                _ => Condition::Equals(Value::from_json(domain)),
            };
            filter.conditions.push((field.clone(), condition));
        }
        Ok(filter)
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, cond)| cond)
    }

    pub fn remove(&mut self, field: &str) -> Option<Condition> {
        let pos = self.conditions.iter().position(|(name, _)| name == field)?;
        Some(self.conditions.remove(pos).1)
    }

    /// Rename a field in place, keeping its position.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some((name, _)) = self.conditions.iter_mut().find(|(name, _)| name == from) {
            *name = to.to_string();
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Iterate over `(field, condition)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(name, cond)| (name.as_str(), cond))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&mut String, &mut Condition)> {
        self.conditions.iter_mut().map(|(name, cond)| (name, cond))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (field, cond)) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match cond {
                Condition::Equals(v) => write!(f, "{}: {}", field, v)?,
                Condition::Operators(ops) => {
                    let ops: Vec<String> = ops.iter().map(|(op, v)| format!("{}: {}", op, v)).collect();
                    write!(f, "{}: {{{}}}", field, ops.join(", "))?
                }
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let filter = Filter::new()
            .eq("category", "A")
            .op("property", "$gte", 2.0)
            .op("property", "$lt", 5.0)
            .is_in("tag", ["x", "y"]);

        assert_eq!(filter.len(), 3);
        assert_eq!(filter.get("category"), Some(&Condition::Equals(Value::Text("A".into()))));
        match filter.get("property") {
            Some(Condition::Operators(ops)) => assert_eq!(ops.len(), 2),
            other => panic!("unexpected condition: {:?}", other),
        }
        assert_eq!(
            filter.get("tag"),
            Some(&Condition::Operators(vec![(
                "$in".to_string(),
                Value::Array(vec!["x".into(), "y".into()])
            )]))
        );
    }

    #[test]
    fn test_from_json() {
        let filter = Filter::from_json(&json!({
            "category": "A",
            "property": {"$gte": 2.0},
            "normalization": {"scale": 1},
        }))
        .unwrap();

        assert_eq!(filter.get("category"), Some(&Condition::Equals(Value::Text("A".into()))));
        assert_eq!(
            filter.get("property"),
            Some(&Condition::Operators(vec![("$gte".to_string(), Value::Float(2.0))]))
        );
        // plain objects are equality on an embedded value
        assert!(matches!(filter.get("normalization"), Some(Condition::Equals(Value::Entity(_)))));
    }

    #[test]
    fn test_constraints_on_one_field_combine() {
        let filter = Filter::new().eq("id", 5).op("id", "$lt", 9);
        assert_eq!(
            filter.get("id"),
            Some(&Condition::Operators(vec![
                ("$eq".to_string(), Value::Integer(5)),
                ("$lt".to_string(), Value::Integer(9)),
            ]))
        );

        let filter = Filter::new().op("score", "$gte", 1).eq("score", 3);
        assert_eq!(
            filter.get("score"),
            Some(&Condition::Operators(vec![
                ("$gte".to_string(), Value::Integer(1)),
                ("$eq".to_string(), Value::Integer(3)),
            ]))
        );
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_from_json_keeps_field_order() {
        let filter = Filter::from_json(&json!({
            "size": {"$in": [1, 2]},
            "category": {"$in": ["A", "B"]},
            "area": 3,
        }))
        .unwrap();
        let fields: Vec<&str> = filter.iter().map(|(field, _)| field).collect();
        assert_eq!(fields, vec!["size", "category", "area"]);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            Filter::from_json(&json!([1, 2])),
            Err(CollectionError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_rename_and_remove() {
        let mut filter = Filter::new().eq("id", 5).eq("name", "x");
        filter.rename("id", "_id");
        assert!(filter.contains("_id"));
        assert!(!filter.contains("id"));
        assert_eq!(filter.iter().next().map(|(f, _)| f), Some("_id"));

        assert_eq!(filter.remove("name"), Some(Condition::Equals("x".into())));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_display() {
        let filter = Filter::new().eq("category", "A").op("score", "$gt", 1);
        assert_eq!(filter.to_string(), "{category: 'A', score: {$gt: 1}}");
    }
}
