//! Native store queries.
//!
//! A native query is a kind, an ordering and a conjunction of property
//! filters. The store has no `IN` or `OR`; disjunctions are emulated by the
//! collection layer issuing several queries.

use std::fmt;

use super::types::Kind;
use super::value::Value;

/// Reserved property name addressing the entity key in filters and orders.
pub const KEY_PROPERTY: &str = "__key__";

/// Comparison operators the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyOperator {
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl PropertyOperator {
    /// Parse an operator symbol (`=`, `>`, `>=`, `<`, `<=`).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(PropertyOperator::Equal),
            ">" => Some(PropertyOperator::GreaterThan),
            ">=" => Some(PropertyOperator::GreaterThanOrEqual),
            "<" => Some(PropertyOperator::LessThan),
            "<=" => Some(PropertyOperator::LessThanOrEqual),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            PropertyOperator::Equal => "=",
            PropertyOperator::GreaterThan => ">",
            PropertyOperator::GreaterThanOrEqual => ">=",
            PropertyOperator::LessThan => "<",
            PropertyOperator::LessThanOrEqual => "<=",
        }
    }
}

impl fmt::Display for PropertyOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One conjunct of a native query.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub property: String,
    pub operator: PropertyOperator,
    pub value: Value,
}

impl fmt::Display for PropertyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.property, self.operator, self.value)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort specification for one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub property: String,
    pub direction: SortDirection,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse the store's order notation: `"-prop"` is descending, `"prop"`
    /// ascending.
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(property) => Self::desc(property),
            None => Self::asc(spec),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Ascending => write!(f, "{}", self.property),
            SortDirection::Descending => write!(f, "-{}", self.property),
        }
    }
}

/// A native query against one kind.
///
/// Cloning a query yields an independent copy of its filter set.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    kind: Kind,
    order: Vec<Order>,
    filters: Vec<PropertyFilter>,
}

impl Query {
    pub fn new(kind: Kind, order: Vec<Order>) -> Self {
        Self {
            kind,
            order,
            filters: Vec::new(),
        }
    }

    /// Add a conjunctive predicate.
    pub fn add_filter(
        &mut self,
        property: impl Into<String>,
        operator: PropertyOperator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.filters.push(PropertyFilter {
            property: property.into(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn order(&self) -> &[Order] {
        &self.order
    }

    pub fn filters(&self) -> &[PropertyFilter] {
        &self.filters
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT * FROM {}", self.kind)?;
        for (i, filter) in self.filters.iter().enumerate() {
            let sep = if i == 0 { " WHERE" } else { " AND" };
            write!(f, "{} {}", sep, filter)?;
        }
        if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(|o| o.to_string()).collect();
            write!(f, " ORDER BY {}", order.join(", "))?;
        }
        Ok(())
    }
}
