//! Document templates and compiled document schemas.

use std::collections::HashSet;

use crate::store::Kind;

use super::types::{FieldDef, FieldType, DISCRIMINATOR_ATTRIBUTE, PRIMARY_KEY_ATTRIBUTE};

/// Compiled, immutable description of a registered document type.
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    /// Type name (also the discriminator value of child types).
    pub name: String,
    /// Kind the documents are stored in; `None` for embedded types.
    pub kind: Option<Kind>,
    /// Direct parent type, for child types.
    pub parent: Option<String>,
    /// All ancestors, nearest first.
    pub ancestors: Vec<String>,
    /// Inherited fields first, then the template's own.
    pub fields: Vec<FieldDef>,
    /// Stored names of the properties kept out of the store indexes.
    pub exclude_from_indexes: Vec<String>,
    pub description: Option<String>,
}

impl DocumentSchema {
    /// Check if this is an embedded document type.
    pub fn is_embedded(&self) -> bool {
        self.kind.is_none()
    }

    /// Check if this type inherits from another one.
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Get a field definition by field name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a field definition by stored name.
    pub fn field_by_stored_name(&self, stored: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.stored_name() == stored)
    }

    /// The field stored as the entity key.
    pub fn primary_key(&self) -> Option<&FieldDef> {
        self.field_by_stored_name(PRIMARY_KEY_ATTRIBUTE)
    }

    /// The hidden subtype discriminator, present on child types.
    pub fn discriminator(&self) -> Option<&FieldDef> {
        self.field_by_stored_name(DISCRIMINATOR_ATTRIBUTE)
    }

    /// Translate a field name to its stored name; unknown names pass through.
    pub fn stored_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.field(name).map_or(name, FieldDef::stored_name)
    }

    /// Get field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Check the schema for clashing field names.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut names = HashSet::new();
        let mut stored = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) || !stored.insert(field.stored_name()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(())
    }
}

/// Schema-related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("document type already registered: {0}")]
    DocumentExists(String),

    #[error("unknown parent document type: {0}")]
    UnknownParent(String),

    #[error("{name} and its parent {parent} must both be embedded or both be documents")]
    ParentMismatch { name: String, parent: String },

    #[error("field type {type_name} of '{field}' is currently unsupported for the entity store")]
    UnsupportedField { field: String, type_name: String },

    #[error("duplicate field: {0}")]
    DuplicateField(String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("invalid document type name: {0}")]
    InvalidName(String),
}

impl SchemaError {
    /// Check if the error rejects a field type.
    pub fn is_unsupported_field(&self) -> bool {
        matches!(self, SchemaError::UnsupportedField { .. })
    }
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Declarative template of a document type, turned into a
/// [`DocumentSchema`] by registration.
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    pub(crate) name: String,
    pub(crate) embedded: bool,
    pub(crate) parent: Option<String>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) exclude_from_indexes: Vec<String>,
    pub(crate) description: Option<String>,
}

impl DocumentTemplate {
    /// Start a template for a stored document type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedded: false,
            parent: None,
            fields: Vec::new(),
            exclude_from_indexes: Vec::new(),
            description: None,
        }
    }

    /// Start a template for an embedded document type.
    pub fn embedded(name: impl Into<String>) -> Self {
        Self {
            embedded: true,
            ..Self::new(name)
        }
    }

    /// Inherit from a registered type.
    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a simple field with just name and type.
    pub fn add_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(FieldDef::new(name, field_type))
    }

    /// Add a required field.
    pub fn add_required_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(FieldDef::new(name, field_type).required())
    }

    /// Keep the named fields out of the store indexes.
    pub fn exclude_from_indexes<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.exclude_from_indexes.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }
}
