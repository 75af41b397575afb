//! Entities: one stored record, a key plus its properties.

use std::collections::BTreeMap;

use super::types::{Key, Kind};
use super::value::Value;

/// a stored record
///
/// properties are kept in a BTreeMap for consistent ordering
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// the entity key, possibly incomplete before the first write
    pub key: Key,
    /// property values by name
    pub properties: BTreeMap<String, Value>,
}

impl Entity {
    /// creates an entity bound to `key` with no properties
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    /// creates an entity with the given properties
    pub fn with_properties(key: Key, properties: BTreeMap<String, Value>) -> Self {
        Self { key, properties }
    }

    pub fn kind(&self) -> &Kind {
        self.key.kind()
    }

    /// get a property by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// set a property, returning the previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// merge properties into this entity
    pub fn update(&mut self, properties: impl IntoIterator<Item = (String, Value)>) {
        self.properties.extend(properties);
    }

    /// check if the entity has a property
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }
}
