//! Document types: the façade over collections.
//!
//! A [`DocumentType`] binds a compiled schema to an instance. It builds new
//! documents, commits them in batches, and turns filters written against
//! field names into collection queries against stored names.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::document::Document;
use super::error::{OdmError, OdmResult};
use super::instance::Instance;
use crate::codec::{decode_polymorphic, encode_document, Payload, PRIMARY_KEY};
use crate::collection::{Collection, CollectionError, Condition, Filter, QueryCursor};
use crate::schema::{DocumentSchema, FieldType, FieldValue, DISCRIMINATOR_ATTRIBUTE};
use crate::store::{Identifier, Key, Kind, Order, Value, KEY_PROPERTY};

/// Handle on one registered document type.
///
/// Cheap to clone: an instance handle plus the shared compiled schema.
#[derive(Clone)]
pub struct DocumentType {
    instance: Instance,
    schema: Arc<DocumentSchema>,
}

impl DocumentType {
    pub(crate) fn from_schema(instance: Instance, schema: Arc<DocumentSchema>) -> Self {
        Self { instance, schema }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The store kind; `None` for embedded types.
    pub fn kind(&self) -> Option<&Kind> {
        self.schema.kind.as_ref()
    }

    pub fn is_embedded(&self) -> bool {
        self.schema.is_embedded()
    }

    /// The collection documents of this type live in. Child types share
    /// their root's collection.
    pub fn collection(&self) -> OdmResult<Collection> {
        let kind = self
            .schema
            .kind
            .clone()
            .ok_or_else(|| OdmError::Embedded(self.schema.name.clone()))?;
        self.instance.collection(kind)
    }

    // ==================== Construction ====================

    /// A new, uncommitted document with defaults applied.
    pub fn create(&self) -> Document {
        Document::new(self.clone())
    }

    /// A new document with the given field values assigned.
    pub fn build<S, V>(&self, values: impl IntoIterator<Item = (S, V)>) -> OdmResult<Document>
    where
        S: AsRef<str>,
        V: Into<FieldValue>,
    {
        let mut doc = self.create();
        for (name, value) in values {
            doc.set(name.as_ref(), value)?;
        }
        Ok(doc)
    }

    // ==================== Writes ====================

    /// Commit one document.
    pub fn commit(&self, doc: &mut Document, validate_all: bool) -> OdmResult<()> {
        self.commit_multi(std::slice::from_mut(doc), validate_all)
    }

    /// Commit many documents with a single batched write.
    ///
    /// Only modified documents are written. Each is validated and encoded
    /// before anything reaches the store; any failure, including one raised
    /// by the store, is reported as a validation error. New documents get
    /// their allocated primary key and everything written is marked created
    /// and unmodified.
    pub fn commit_multi(&self, docs: &mut [Document], validate_all: bool) -> OdmResult<()> {
        let collection = self.collection()?;
        let pending: Vec<usize> = docs
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.is_modified())
            .map(|(index, _)| index)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut payloads = Vec::with_capacity(pending.len());
        let mut excluded: Vec<String> = Vec::new();
        for &index in &pending {
            let doc = &mut docs[index];
            let payload = self
                .prepare(doc, validate_all)
                .map_err(|e| OdmError::Validation(e.into_message()))?;
            for name in &doc.document_type().schema().exclude_from_indexes {
                if !excluded.contains(name) {
                    excluded.push(name.clone());
                }
            }
            payloads.push(payload);
        }

        debug!(
            target: "entitydoc::document",
            document_type = %self.name(),
            batch = payloads.len(),
            "committing documents"
        );
        let keys = collection
            .put_multi(payloads, &excluded)
            .map_err(|e| OdmError::Validation(OdmError::from(e).into_message()))?;

        for (&index, key) in pending.iter().zip(keys) {
            let doc = &mut docs[index];
            if doc.pk().is_none() {
                let pk_field = doc.document_type().schema().primary_key().map(|f| f.name.clone());
                if let (Some(name), Some(identifier)) = (pk_field, key.id_or_name()) {
                    doc.set_raw(&name, FieldValue::from(identifier.clone()));
                }
            }
            doc.set_created(true);
            doc.clear_modified();
        }
        Ok(())
    }

    /// Validate and encode one document. Formatted strings are refreshed
    /// with the rendered value.
    fn prepare(&self, doc: &mut Document, validate_all: bool) -> OdmResult<Payload> {
        let actual = doc.document_type().name().to_string();
        if !self.instance.is_subtype(&actual, self.name()) {
            return Err(OdmError::Validation(format!(
                "{} document cannot be committed as {}",
                actual,
                self.name()
            )));
        }
        doc.required_validate()?;
        doc.io_validate(validate_all)?;
        let payload = encode_document(doc)?;

        let schema = Arc::clone(doc.document_type().schema());
        for field in &schema.fields {
            if let (FieldType::FormattedString(_), Some(Value::Text(rendered))) =
                (&field.field_type, payload.get(field.stored_name()))
            {
                doc.set_raw(&field.name, FieldValue::String(rendered.clone()));
            }
        }
        Ok(payload)
    }

    /// Remove a committed document from the store.
    pub fn delete(&self, doc: &mut Document) -> OdmResult<()> {
        if !doc.is_created() {
            return Err(OdmError::NotCreated(format!(
                "{} document was never committed",
                doc.document_type().name()
            )));
        }
        let key = self.key_of(doc)?;
        self.collection()?
            .delete(&key)
            .map_err(|e| OdmError::Delete(e.to_string()))?;
        debug!(target: "entitydoc::document", key = %key, "document deleted");
        doc.set_created(false);
        Ok(())
    }

    /// Replace a document's values with the stored ones.
    pub fn reload(&self, doc: &mut Document) -> OdmResult<()> {
        let pk = doc
            .pk()
            .ok_or_else(|| OdmError::NotCreated(format!("{} document has no primary key", self.name())))?;
        let loaded = self
            .get(pk.clone())?
            .ok_or_else(|| OdmError::NotCreated(format!("{} {} not found", self.name(), pk)))?;
        doc.replace_with(loaded);
        Ok(())
    }

    /// The store key of a document with a primary key.
    pub fn key_of(&self, doc: &Document) -> OdmResult<Key> {
        let pk = doc
            .pk()
            .ok_or_else(|| OdmError::NotCreated(format!("{} document has no primary key", self.name())))?;
        Ok(self.collection()?.key(Some(pk))?)
    }

    // ==================== Reads ====================

    /// Load a document by primary key.
    pub fn get(&self, pk: Identifier) -> OdmResult<Option<Document>> {
        let payload = self.collection()?.get(pk)?;
        payload.map(|payload| self.decode(payload)).transpose()
    }

    /// Load many documents, one slot per primary key.
    pub fn get_multi(&self, pks: &[Identifier]) -> OdmResult<Vec<Option<Document>>> {
        self.collection()?
            .get_multi(pks)?
            .into_iter()
            .map(|payload| payload.map(|payload| self.decode(payload)).transpose())
            .collect()
    }

    /// Query documents.
    ///
    /// Filter and order use field names; they are rewritten to stored names
    /// here. Queries on a child type only match that type and its
    /// descendants.
    pub fn find(&self, filter: &Filter, order: &[Order], limit: Option<usize>) -> OdmResult<DocumentCursor> {
        let collection = self.collection()?;
        let filter = self.cook_filter(filter)?;
        let order: Vec<Order> = order
            .iter()
            .map(|spec| {
                let mut spec = spec.clone();
                spec.property = self.order_property(&spec.property);
                spec
            })
            .collect();

        debug!(
            target: "entitydoc::document",
            document_type = %self.name(),
            filter = %filter,
            "find"
        );
        Ok(DocumentCursor {
            doc_type: self.clone(),
            cursor: collection.query(&filter, &order, limit)?,
        })
    }

    /// First match of `filter` in `order`, if any.
    pub fn find_one(&self, filter: &Filter, order: &[Order]) -> OdmResult<Option<Document>> {
        self.find(filter, order, Some(1))?.next().transpose()
    }

    /// Number of documents matching `filter`.
    pub fn count(&self, filter: &Filter) -> OdmResult<usize> {
        let mut count = 0;
        for doc in self.find(filter, &[], None)? {
            doc?;
            count += 1;
        }
        Ok(count)
    }

    fn decode(&self, payload: Payload) -> OdmResult<Document> {
        let mut doc = decode_polymorphic(&self.instance, self.name(), payload)?;
        doc.set_created(true);
        Ok(doc)
    }

    fn order_property(&self, name: &str) -> String {
        match self.schema.stored_name(name) {
            PRIMARY_KEY => KEY_PROPERTY.to_string(),
            stored => stored.to_string(),
        }
    }

    /// Rewrite field names to stored names, lift reference operands into
    /// keys and restrict child types to their lineage.
    fn cook_filter(&self, filter: &Filter) -> OdmResult<Filter> {
        let mut cooked = filter.clone();
        for (field, condition) in cooked.iter_mut() {
            let Some(def) = self.schema.field(field.as_str()) else {
                continue;
            };
            if let Some(target) = reference_target(&def.field_type) {
                let kind = self
                    .instance
                    .schema(target)
                    .and_then(|schema| schema.kind.clone())
                    .ok_or_else(|| OdmError::UnknownDocumentType(target.to_string()))?;
                match condition {
                    Condition::Equals(value) => lift_reference(&kind, value)?,
                    Condition::Operators(ops) => {
                        for (_, operand) in ops.iter_mut() {
                            lift_reference(&kind, operand)?;
                        }
                    }
                }
            }
            *field = def.stored_name().to_string();
        }

        if self.schema.is_child() && !cooked.contains(DISCRIMINATOR_ATTRIBUTE) {
            let lineage = self.instance.lineage(self.name());
            cooked.set(
                DISCRIMINATOR_ATTRIBUTE.to_string(),
                Condition::Operators(vec![(
                    "$in".to_string(),
                    Value::Array(lineage.into_iter().map(Value::Text).collect()),
                )]),
            );
        }
        Ok(cooked)
    }
}

fn reference_target(field_type: &FieldType) -> Option<&str> {
    match field_type {
        FieldType::Reference(target) => Some(target),
        FieldType::List(inner) => reference_target(inner),
        _ => None,
    }
}

/// Identifiers compared against a reference field become keys of the
/// referenced kind.
fn lift_reference(kind: &Kind, value: &mut Value) -> OdmResult<()> {
    match value {
        Value::Array(items) => items.iter_mut().try_for_each(|item| lift_reference(kind, item)),
        Value::Integer(_) | Value::Text(_) => {
            if let Some(identifier) = value.to_identifier() {
                let key = Key::new(kind.clone(), identifier)
                    .map_err(|e| CollectionError::InvalidFilter(format!("reference filter: {}", e)))?;
                *value = Value::Key(key);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

impl fmt::Debug for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentType")
            .field("name", &self.schema.name)
            .field("kind", &self.schema.kind)
            .finish()
    }
}

/// Lazy stream of documents produced by [`DocumentType::find`].
pub struct DocumentCursor {
    doc_type: DocumentType,
    cursor: QueryCursor,
}

impl DocumentCursor {
    /// Native queries not started yet.
    pub fn pending_queries(&self) -> usize {
        self.cursor.pending_queries()
    }
}

impl Iterator for DocumentCursor {
    type Item = OdmResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let payload = match self.cursor.next()? {
            Ok(payload) => payload,
            Err(e) => return Some(Err(e.into())),
        };
        Some(self.doc_type.decode(payload))
    }
}

impl fmt::Debug for DocumentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCursor")
            .field("document_type", &self.doc_type.name())
            .field("cursor", &self.cursor)
            .finish()
    }
}
