//! Filter translation: one declarative filter in, native queries out.
//!
//! The store only understands conjunctions of `=`, `>`, `>=`, `<`, `<=`.
//! `$in` is emulated by fanning the query set out, one clone per operand,
//! so the union of the resulting queries' results is the filter's result.
//!
//! ```text
//!   seed: SELECT * FROM Item
//!   filter: {category: {$in: [A, B]}, score: {$gte: 2}}
//!
//!   category $in  ──►  [ .. WHERE category = 'A',
//!                        .. WHERE category = 'B' ]
//!   score $gte    ──►  [ .. WHERE category = 'A' AND score >= 2,
//!                        .. WHERE category = 'B' AND score >= 2 ]
//! ```

use std::fmt;

use tracing::debug;

use super::error::{CollectionError, CollectionResult};
use super::filter::{Condition, Filter};
use crate::codec::PRIMARY_KEY;
use crate::store::{Key, Kind, PropertyOperator, Query, Value, KEY_PROPERTY};

/// Operators accepted in filter operator mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOperator {
    /// Look an operator up by name; `None` for anything unknown.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "$eq" => Some(FilterOperator::Eq),
            "$gt" => Some(FilterOperator::Gt),
            "$gte" => Some(FilterOperator::Gte),
            "$lt" => Some(FilterOperator::Lt),
            "$lte" => Some(FilterOperator::Lte),
            "$in" => Some(FilterOperator::In),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "$eq",
            FilterOperator::Gt => "$gt",
            FilterOperator::Gte => "$gte",
            FilterOperator::Lt => "$lt",
            FilterOperator::Lte => "$lte",
            FilterOperator::In => "$in",
        }
    }

    /// The native comparison for this operator. `$in` has none.
    pub fn property_operator(&self) -> Option<PropertyOperator> {
        match self {
            FilterOperator::Eq => Some(PropertyOperator::Equal),
            FilterOperator::Gt => Some(PropertyOperator::GreaterThan),
            FilterOperator::Gte => Some(PropertyOperator::GreaterThanOrEqual),
            FilterOperator::Lt => Some(PropertyOperator::LessThan),
            FilterOperator::Lte => Some(PropertyOperator::LessThanOrEqual),
            FilterOperator::In => None,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Translate `filter` into native queries derived from `seed`.
///
/// Scalar conditions and comparison operators narrow every variant in
/// place. Each `$in` replaces every variant by one clone per operand, in
/// operand order, so results of the first operand come first. An empty
/// `$in` list yields no queries at all.
pub fn translate(seed: Query, filter: &Filter) -> CollectionResult<Vec<Query>> {
    let kind = seed.kind().clone();
    let mut variants = vec![seed];

    for (field, condition) in filter.iter() {
        let (property, is_key) = if field == PRIMARY_KEY {
            (KEY_PROPERTY, true)
        } else {
            (field, false)
        };
        let operand = |value: &Value| -> CollectionResult<Value> {
            if is_key {
                key_operand(&kind, value)
            } else {
                Ok(value.clone())
            }
        };

        match condition {
            Condition::Equals(value) => {
                let value = operand(value)?;
                for query in &mut variants {
                    query.add_filter(property, PropertyOperator::Equal, value.clone());
                }
            }
            Condition::Operators(ops) => {
                for (name, value) in ops {
                    let op = FilterOperator::from_name(name)
                        .ok_or_else(|| CollectionError::UnknownOperator(name.clone()))?;

                    match op.property_operator() {
                        Some(native) => {
                            let value = operand(value)?;
                            for query in &mut variants {
                                query.add_filter(property, native, value.clone());
                            }
                        }
                        None => {
                            let Value::Array(items) = value else {
                                return Err(CollectionError::InvalidFilter(format!(
                                    "$in on '{}' expects a list, got {}",
                                    field,
                                    value.type_name()
                                )));
                            };
                            let items = items.iter().map(&operand).collect::<CollectionResult<Vec<_>>>()?;
                            variants = fan_out(variants, property, &items);
                        }
                    }
                }
            }
        }
    }

    debug!(
        target: "entitydoc::collection",
        kind = %kind,
        filter = %filter,
        queries = variants.len(),
        "translated filter"
    );
    Ok(variants)
}

/// Replace each variant by one independent clone per value.
fn fan_out(variants: Vec<Query>, property: &str, values: &[Value]) -> Vec<Query> {
    let mut expanded = Vec::with_capacity(variants.len() * values.len());
    for query in &variants {
        for value in values {
            let mut clone = query.clone();
            clone.add_filter(property, PropertyOperator::Equal, value.clone());
            expanded.push(clone);
        }
    }
    expanded
}

/// Key filters compare keys, so bare identifiers are lifted into `kind`.
fn key_operand(kind: &Kind, value: &Value) -> CollectionResult<Value> {
    if let Value::Key(_) = value {
        return Ok(value.clone());
    }
    let identifier = value.to_identifier().ok_or_else(|| {
        CollectionError::InvalidFilter(format!(
            "primary key filter expects an identifier, got {}",
            value.type_name()
        ))
    })?;
    let key = Key::new(kind.clone(), identifier)
        .map_err(|e| CollectionError::InvalidFilter(format!("primary key filter: {}", e)))?;
    Ok(Value::Key(key))
}
