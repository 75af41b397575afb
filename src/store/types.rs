//! core type-safe wrappers for kinds, identifiers and keys.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A validated entity kind (the store's partitioning unit).
///
/// Valid kinds:
/// - 1-1500 bytes
/// - Cannot start with `__` (reserved for store internals such as `__key__`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Kind(String);

impl Kind {
    /// maximum kind length accepted by the store
    const MAX_LEN: usize = 1500;

    /// create a new Kind, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        if name.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        if name.starts_with("__") {
            return Err(InvalidNameError::Reserved(name.to_string()));
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Kind {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The scalar part of a key: a numeric id or a string name.
///
/// Numeric ids sort before names, matching the store's key ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Id(i64),
    Name(String),
}

impl Identifier {
    /// check the identifier is acceptable as part of a complete key
    pub fn validate(&self) -> Result<(), InvalidNameError> {
        match self {
            Identifier::Id(0) => Err(InvalidNameError::ZeroId),
            Identifier::Id(_) => Ok(()),
            Identifier::Name(name) if name.is_empty() => Err(InvalidNameError::Empty),
            Identifier::Name(name) if name.starts_with("__") && name.ends_with("__") => {
                Err(InvalidNameError::Reserved(name.clone()))
            }
            Identifier::Name(_) => Ok(()),
        }
    }

    pub fn as_id(&self) -> Option<i64> {
        match self {
            Identifier::Id(id) => Some(*id),
            Identifier::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Identifier::Id(_) => None,
            Identifier::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "{}", id),
            Identifier::Name(name) => write!(f, "'{}'", name),
        }
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Id(id)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(name)
    }
}

/// A store key: kind plus an optional identifier.
///
/// A key without identifier is incomplete; the store allocates an id for it
/// on write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    kind: Kind,
    identifier: Option<Identifier>,
}

impl Key {
    /// create a complete key
    pub fn new(kind: Kind, identifier: Identifier) -> Result<Self, InvalidNameError> {
        identifier.validate()?;
        Ok(Self {
            kind,
            identifier: Some(identifier),
        })
    }

    /// create an incomplete key meant for insertion
    pub fn incomplete(kind: Kind) -> Self {
        Self {
            kind,
            identifier: None,
        }
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// the identifier, if the key is complete
    pub fn id_or_name(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.identifier.is_some()
    }

    /// complete an incomplete key with an allocated identifier
    pub(crate) fn completed(self, identifier: Identifier) -> Self {
        Self {
            kind: self.kind,
            identifier: Some(identifier),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.identifier.cmp(&other.identifier))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(identifier) => write!(f, "Key({}, {})", self.kind, identifier),
            None => write!(f, "Key({}, <incomplete>)", self.kind),
        }
    }
}

/// error type for invalid kinds and identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    Reserved(String),
    ZeroId,
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} bytes", len),
            Self::Reserved(name) => write!(f, "'{}' is a reserved name", name),
            Self::ZeroId => write!(f, "numeric id cannot be zero"),
        }
    }
}

impl std::error::Error for InvalidNameError {}
