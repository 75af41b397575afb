//! Registry of compiled document types.
//!
//! Registration compiles a [`DocumentTemplate`] once into an immutable
//! [`DocumentSchema`]. The registry also owns the offspring sets used to
//! dispatch on the `_cls` discriminator when decoding.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::schema::{DocumentSchema, DocumentTemplate, SchemaError, SchemaResult};
use super::types::{FieldDef, FieldType, DISCRIMINATOR_ATTRIBUTE, PRIMARY_KEY_ATTRIBUTE};
use crate::store::Kind;

/// Name of the implicit primary-key field.
pub const DEFAULT_PRIMARY_KEY_FIELD: &str = "id";

/// Name of the discriminator field added to child types.
pub const DISCRIMINATOR_FIELD: &str = "cls";

/// Registered document types by name.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: HashMap<String, Arc<DocumentSchema>>,
    /// Every registered descendant of a type, at any depth.
    offspring: HashMap<String, BTreeSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register `template`.
    ///
    /// Fails before anything is registered when a field type is outside
    /// the supported set, the parent is unknown, or field names clash.
    pub fn register(&mut self, template: DocumentTemplate) -> SchemaResult<Arc<DocumentSchema>> {
        if self.schemas.contains_key(&template.name) {
            return Err(SchemaError::DocumentExists(template.name));
        }
        if template.name.is_empty() {
            return Err(SchemaError::InvalidName(template.name));
        }

        for field in &template.fields {
            if let Some(unsupported) = field.field_type.unsupported_part() {
                return Err(SchemaError::UnsupportedField {
                    field: field.name.clone(),
                    type_name: unsupported.type_name(),
                });
            }
        }

        let parent = match &template.parent {
            Some(name) => {
                let parent = self
                    .schemas
                    .get(name)
                    .cloned()
                    .ok_or_else(|| SchemaError::UnknownParent(name.clone()))?;
                if parent.is_embedded() != template.embedded {
                    return Err(SchemaError::ParentMismatch {
                        name: template.name.clone(),
                        parent: name.clone(),
                    });
                }
                Some(parent)
            }
            None => None,
        };

        let mut fields: Vec<FieldDef> = match &parent {
            Some(parent) => parent
                .fields
                .iter()
                .filter(|f| f.stored_name() != DISCRIMINATOR_ATTRIBUTE)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let declares_primary_key = template.fields.iter().any(FieldDef::is_primary_key);
        if !template.embedded && parent.is_none() && !declares_primary_key {
            fields.push(FieldDef::new(DEFAULT_PRIMARY_KEY_FIELD, FieldType::Identifier).attribute(PRIMARY_KEY_ATTRIBUTE));
        }
        if parent.is_some() {
            fields.push(
                FieldDef::new(DISCRIMINATOR_FIELD, FieldType::String)
                    .attribute(DISCRIMINATOR_ATTRIBUTE)
                    .default_value(template.name.as_str()),
            );
        }
        fields.extend(template.fields);

        let kind = if template.embedded {
            None
        } else {
            let root = match &parent {
                Some(parent) => parent.kind.clone(),
                None => None,
            };
            match root {
                Some(kind) => Some(kind),
                None => Some(Kind::new(template.name.as_str()).map_err(|e| SchemaError::InvalidName(e.to_string()))?),
            }
        };

        let ancestors = match &parent {
            Some(parent) => std::iter::once(parent.name.clone())
                .chain(parent.ancestors.iter().cloned())
                .collect(),
            None => Vec::new(),
        };

        let mut schema = DocumentSchema {
            name: template.name,
            kind,
            parent: parent.as_ref().map(|p| p.name.clone()),
            ancestors,
            fields,
            exclude_from_indexes: Vec::new(),
            description: template.description,
        };
        schema.validate()?;

        let mut excluded = parent
            .as_ref()
            .map(|p| p.exclude_from_indexes.clone())
            .unwrap_or_default();
        for name in &template.exclude_from_indexes {
            let field = schema
                .field(name)
                .ok_or_else(|| SchemaError::FieldNotFound(name.clone()))?;
            let stored = field.stored_name().to_string();
            if !excluded.contains(&stored) {
                excluded.push(stored);
            }
        }
        schema.exclude_from_indexes = excluded;

        // Notify every ancestor of the newborn.
        for ancestor in &schema.ancestors {
            self.offspring
                .entry(ancestor.clone())
                .or_default()
                .insert(schema.name.clone());
        }

        debug!(
            target: "entitydoc::schema",
            name = %schema.name,
            kind = ?schema.kind.as_ref().map(Kind::as_str),
            parent = ?schema.parent,
            fields = schema.fields.len(),
            "registered document type"
        );

        let schema = Arc::new(schema);
        self.schemas.insert(schema.name.clone(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Get a registered schema by name.
    pub fn get(&self, name: &str) -> Option<Arc<DocumentSchema>> {
        self.schemas.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// All registered descendants of `name`.
    pub fn offspring(&self, name: &str) -> BTreeSet<String> {
        self.offspring.get(name).cloned().unwrap_or_default()
    }

    /// `name` followed by its descendants.
    pub fn lineage(&self, name: &str) -> Vec<String> {
        std::iter::once(name.to_string())
            .chain(self.offspring(name))
            .collect()
    }

    /// Check if `name` is `ancestor` or one of its descendants.
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> bool {
        name == ancestor
            || self
                .offspring
                .get(ancestor)
                .is_some_and(|set| set.contains(name))
    }

    /// Pick the schema to decode a value declared as `declared`.
    ///
    /// Without discriminator the declared type is used. A discriminator must
    /// name the declared type or one of its descendants.
    pub fn resolve_subtype(&self, declared: &str, discriminator: Option<&str>) -> Option<Arc<DocumentSchema>> {
        match discriminator {
            Some(name) if self.is_subtype(name, declared) => self.get(name),
            Some(_) => None,
            None => self.get(declared),
        }
    }

    /// Get registered type names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                DocumentTemplate::new("Animal")
                    .add_required_field("name", FieldType::String)
                    .field(FieldDef::new("notes", FieldType::String).attribute("n"))
                    .exclude_from_indexes(["notes"]),
            )
            .unwrap();
        registry
            .register(DocumentTemplate::new("Dog").child_of("Animal").add_field("breed", FieldType::String))
            .unwrap();
        registry
            .register(DocumentTemplate::new("Puppy").child_of("Dog").add_field("age", FieldType::Integer))
            .unwrap();
        registry
    }

    #[test]
    fn test_implicit_primary_key() {
        let registry = setup();
        let animal = registry.get("Animal").unwrap();

        let pk = animal.primary_key().unwrap();
        assert_eq!(pk.name, DEFAULT_PRIMARY_KEY_FIELD);
        assert_eq!(pk.field_type, FieldType::Identifier);
        assert_eq!(animal.kind.as_ref().map(Kind::as_str), Some("Animal"));
        assert_eq!(animal.exclude_from_indexes, vec!["n".to_string()]);
        assert!(animal.discriminator().is_none());
    }

    #[test]
    fn test_declared_primary_key() {
        let mut registry = Registry::new();
        let schema = registry
            .register(
                DocumentTemplate::new("Tag")
                    .field(FieldDef::new("slug", FieldType::String).attribute(PRIMARY_KEY_ATTRIBUTE)),
            )
            .unwrap();

        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.primary_key().map(|f| f.name.as_str()), Some("slug"));
    }

    #[test]
    fn test_children_share_root_kind() {
        let registry = setup();
        let puppy = registry.get("Puppy").unwrap();

        assert_eq!(puppy.kind.as_ref().map(Kind::as_str), Some("Animal"));
        assert_eq!(puppy.ancestors, vec!["Dog".to_string(), "Animal".to_string()]);
        assert_eq!(puppy.field_names(), vec!["id", "name", "notes", "breed", "cls", "age"]);
        assert_eq!(puppy.exclude_from_indexes, vec!["n".to_string()]);

        let cls = puppy.discriminator().unwrap();
        assert_eq!(cls.default, Some("Puppy".into()));
    }

    #[test]
    fn test_offspring() {
        let registry = setup();
        assert_eq!(registry.lineage("Animal"), vec!["Animal", "Dog", "Puppy"]);
        assert_eq!(registry.lineage("Dog"), vec!["Dog", "Puppy"]);
        assert!(registry.offspring("Puppy").is_empty());

        assert!(registry.is_subtype("Puppy", "Animal"));
        assert!(!registry.is_subtype("Animal", "Dog"));
    }

    #[test]
    fn test_resolve_subtype() {
        let registry = setup();
        assert_eq!(registry.resolve_subtype("Animal", None).unwrap().name, "Animal");
        assert_eq!(registry.resolve_subtype("Animal", Some("Puppy")).unwrap().name, "Puppy");
        assert!(registry.resolve_subtype("Dog", Some("Animal")).is_none());
        assert!(registry.resolve_subtype("Animal", Some("Cat")).is_none());
    }

    #[test]
    fn test_unsupported_field_rejected() {
        let mut registry = Registry::new();
        let result = registry.register(
            DocumentTemplate::new("Invoice")
                .add_field("amount", FieldType::Decimal)
                .add_field("number", FieldType::Integer),
        );

        match result {
            Err(SchemaError::UnsupportedField { field, type_name }) => {
                assert_eq!(field, "amount");
                assert_eq!(type_name, "DecimalField");
            }
            other => panic!("expected unsupported field, got {:?}", other),
        }
        assert!(!registry.contains("Invoice"));

        let nested = registry.register(
            DocumentTemplate::new("Batch").add_field("ids", FieldType::List(Box::new(FieldType::Uuid))),
        );
        assert!(nested.unwrap_err().is_unsupported_field());
    }

    #[test]
    fn test_registration_errors() {
        let mut registry = setup();
        assert!(matches!(
            registry.register(DocumentTemplate::new("Animal")),
            Err(SchemaError::DocumentExists(_))
        ));
        assert!(matches!(
            registry.register(DocumentTemplate::new("Cat").child_of("Feline")),
            Err(SchemaError::UnknownParent(_))
        ));
        assert!(matches!(
            registry.register(DocumentTemplate::embedded("Collar").child_of("Dog")),
            Err(SchemaError::ParentMismatch { .. })
        ));
        assert!(matches!(
            registry.register(DocumentTemplate::new("Cat").child_of("Animal").add_field("name", FieldType::String)),
            Err(SchemaError::DuplicateField(_))
        ));
        assert!(matches!(
            registry.register(DocumentTemplate::new("Bird").exclude_from_indexes(["wings"])),
            Err(SchemaError::FieldNotFound(_))
        ));
        assert!(matches!(
            registry.register(DocumentTemplate::new("__Hidden__")),
            Err(SchemaError::InvalidName(_))
        ));
    }

    #[test]
    fn test_embedded_has_no_kind_or_key() {
        let mut registry = Registry::new();
        let schema = registry
            .register(DocumentTemplate::embedded("Normalizer").add_required_field("scale", FieldType::Integer))
            .unwrap();

        assert!(schema.is_embedded());
        assert!(schema.primary_key().is_none());
    }
}
