//! Document instances.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::error::{OdmError, OdmResult};
use super::facade::DocumentType;
use super::instance::Instance;
use super::reference::Reference;
use crate::schema::{FieldDef, FieldType, FieldValue};
use crate::store::Identifier;

/// One document: field values plus bookkeeping.
///
/// A document tracks which fields were assigned since it was last committed
/// or loaded, and whether it exists in the store. Documents compare equal
/// when they have the same type and field values.
#[derive(Clone)]
pub struct Document {
    doc_type: DocumentType,
    data: BTreeMap<String, FieldValue>,
    modified: BTreeSet<String>,
    created: bool,
}

impl Document {
    /// A fresh document with defaults applied.
    ///
    /// Dict fields without default start empty.
    pub(crate) fn new(doc_type: DocumentType) -> Self {
        let mut data = BTreeMap::new();
        let mut modified = BTreeSet::new();
        for field in &doc_type.schema().fields {
            let initial = match (&field.default, &field.field_type) {
                (Some(default), _) => default.clone(),
                (None, FieldType::Dict) => FieldValue::Dict(BTreeMap::new()),
                (None, _) => continue,
            };
            data.insert(field.name.clone(), initial);
            modified.insert(field.name.clone());
        }
        Self {
            doc_type,
            data,
            modified,
            created: false,
        }
    }

    /// A document rebuilt from stored data, nothing modified.
    pub(crate) fn from_data(doc_type: DocumentType, data: BTreeMap<String, FieldValue>) -> Self {
        Self {
            doc_type,
            data,
            modified: BTreeSet::new(),
            created: false,
        }
    }

    pub(crate) fn set_created(&mut self, created: bool) {
        self.created = created;
    }

    pub(crate) fn replace_with(&mut self, loaded: Document) {
        self.doc_type = loaded.doc_type;
        self.data = loaded.data;
        self.modified.clear();
        self.created = true;
    }

    pub(crate) fn set_raw(&mut self, name: &str, value: FieldValue) {
        self.data.insert(name.to_string(), value);
    }

    pub fn document_type(&self) -> &DocumentType {
        &self.doc_type
    }

    pub fn data(&self) -> &BTreeMap<String, FieldValue> {
        &self.data
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.data.get(name)
    }

    fn instance(&self) -> &Instance {
        self.doc_type.instance()
    }

    fn field_def(&self, name: &str) -> OdmResult<&FieldDef> {
        self.doc_type
            .schema()
            .field(name)
            .ok_or_else(|| OdmError::UnknownField {
                document_type: self.doc_type.name().to_string(),
                field: name.to_string(),
            })
    }

    // ==================== Field access ====================

    /// Assign a field.
    ///
    /// The value is type checked and run through the field's validators;
    /// embedded documents must be of the declared type or a subtype. Integers
    /// assigned to float fields are stored as floats.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> OdmResult<()> {
        let field = self.field_def(name)?;
        let value = coerce(&field.field_type, value.into());
        field.check(&value).map_err(OdmError::Validation)?;
        check_embedded(self.instance(), &field.field_type, &value)
            .map_err(|e| OdmError::Validation(format!("field '{}': {}", name, e)))?;

        self.data.insert(name.to_string(), value);
        self.modified.insert(name.to_string());
        Ok(())
    }

    /// Remove a field's value.
    pub fn unset(&mut self, name: &str) -> OdmResult<Option<FieldValue>> {
        self.field_def(name)?;
        let previous = self.data.remove(name);
        self.modified.insert(name.to_string());
        Ok(previous)
    }

    /// Mutable access to a reference field, e.g. to fetch its target.
    pub fn reference_mut(&mut self, name: &str) -> Option<&mut Reference> {
        self.data.get_mut(name).and_then(FieldValue::as_reference_mut)
    }

    /// The primary key, once assigned.
    pub fn pk(&self) -> Option<Identifier> {
        let field = self.doc_type.schema().primary_key()?;
        self.data.get(&field.name).and_then(FieldValue::to_identifier)
    }

    // ==================== State ====================

    /// Check if the document exists in the store.
    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Check if the document needs writing: new documents always do.
    pub fn is_modified(&self) -> bool {
        !self.created || !self.modified.is_empty()
    }

    pub fn modified_fields(&self) -> &BTreeSet<String> {
        &self.modified
    }

    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }

    // ==================== Validation ====================

    /// Check that every required field holds a value.
    ///
    /// The primary key and formatted strings are computed, so they are
    /// skipped. Embedded documents are checked recursively.
    pub fn required_validate(&self) -> OdmResult<()> {
        for field in &self.doc_type.schema().fields {
            if field.is_primary_key() || matches!(field.field_type, FieldType::FormattedString(_)) {
                continue;
            }
            let value = self.data.get(&field.name).unwrap_or(&FieldValue::Null);
            if field.required && value.is_null() {
                return Err(OdmError::Validation(format!(
                    "{}: field '{}' is required",
                    self.doc_type.name(),
                    field.name
                )));
            }
            for_each_embedded(value, &mut |doc: &Document| doc.required_validate())?;
        }
        Ok(())
    }

    /// Run the commit-time validators.
    ///
    /// Only modified fields are checked unless `validate_all` is set. List
    /// values are validated item by item. Embedded documents are always
    /// validated in full.
    pub fn io_validate(&self, validate_all: bool) -> OdmResult<()> {
        for field in &self.doc_type.schema().fields {
            if !validate_all && !self.modified.contains(&field.name) {
                continue;
            }
            let value = self.data.get(&field.name).unwrap_or(&FieldValue::Null);
            let items = match value {
                FieldValue::List(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            for validator in &field.io_validators {
                for item in items {
                    validator
                        .validate(item)
                        .map_err(|e| OdmError::Validation(format!("field '{}': {}", field.name, e)))?;
                }
            }
            for_each_embedded(value, &mut |doc: &Document| doc.io_validate(true))?;
        }
        Ok(())
    }

    // ==================== Persistence ====================

    /// A reference pointing at this document.
    pub fn to_reference(&self) -> Reference {
        Reference::new(self.instance().clone(), self.doc_type.name(), self.pk())
    }

    /// Write the document, validating modified fields.
    pub fn commit(&mut self) -> OdmResult<()> {
        self.commit_with(false)
    }

    /// Write the document; `validate_all` runs io validators on every field.
    pub fn commit_with(&mut self, validate_all: bool) -> OdmResult<()> {
        let doc_type = self.doc_type.clone();
        doc_type.commit(self, validate_all)
    }

    pub fn delete(&mut self) -> OdmResult<()> {
        let doc_type = self.doc_type.clone();
        doc_type.delete(self)
    }

    /// Replace the field values with the stored ones.
    pub fn reload(&mut self) -> OdmResult<()> {
        let doc_type = self.doc_type.clone();
        doc_type.reload(self)
    }
}

/// Integers assigned to float fields become floats, in lists too.
fn coerce(field_type: &FieldType, value: FieldValue) -> FieldValue {
    match (field_type, value) {
        (FieldType::Float, FieldValue::Integer(i)) => FieldValue::Float(i as f64),
        (FieldType::List(inner), FieldValue::List(items)) => {
            FieldValue::List(items.into_iter().map(|item| coerce(inner, item)).collect())
        }
        (_, value) => value,
    }
}

fn check_embedded(instance: &Instance, field_type: &FieldType, value: &FieldValue) -> Result<(), String> {
    match (field_type, value) {
        (FieldType::Embedded(declared), FieldValue::Embedded(doc)) => {
            let actual = doc.document_type().name();
            if !instance.is_subtype(actual, declared) {
                return Err(format!("expected {} document, got {}", declared, actual));
            }
            Ok(())
        }
        (FieldType::List(inner), FieldValue::List(items)) => items
            .iter()
            .try_for_each(|item| check_embedded(instance, inner, item)),
        _ => Ok(()),
    }
}

fn for_each_embedded(value: &FieldValue, f: &mut dyn FnMut(&Document) -> OdmResult<()>) -> OdmResult<()> {
    match value {
        FieldValue::Embedded(doc) => f(doc),
        FieldValue::List(items) => items.iter().try_for_each(|item| for_each_embedded(item, f)),
        _ => Ok(()),
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.doc_type.name() == other.doc_type.name() && self.data == other.data
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("type", &self.doc_type.name())
            .field("data", &self.data)
            .field("created", &self.created)
            .field("modified", &self.modified)
            .finish()
    }
}
