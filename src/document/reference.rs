//! Lazy references to other documents.

use std::fmt;

use tracing::debug;

use super::document::Document;
use super::error::{OdmError, OdmResult};
use super::instance::Instance;
use crate::store::Identifier;

/// A typed pointer to a stored document.
///
/// Holds the target type and primary key; the target itself is loaded on
/// the first [`fetch`](Reference::fetch) and cached afterwards. Two
/// references are equal when they point at the same type and key, cached
/// or not.
#[derive(Clone)]
pub struct Reference {
    instance: Instance,
    document_type: String,
    pk: Option<Identifier>,
    cached: Option<Box<Document>>,
}

impl Reference {
    pub fn new(instance: Instance, document_type: impl Into<String>, pk: Option<Identifier>) -> Self {
        Self {
            instance,
            document_type: document_type.into(),
            pk,
            cached: None,
        }
    }

    /// Name of the referenced document type.
    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn pk(&self) -> Option<&Identifier> {
        self.pk.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.cached.is_some()
    }

    /// The cached target, if it was fetched already.
    pub fn cached(&self) -> Option<&Document> {
        self.cached.as_deref()
    }

    /// Drop the cached target.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Load the referenced document.
    ///
    /// The first call reads the target through its document type; later
    /// calls return the cached copy unless `force_reload` is set.
    pub fn fetch(&mut self, force_reload: bool) -> OdmResult<&Document> {
        let doc = match self.cached.take() {
            Some(doc) if !force_reload => {
                debug!(target: "entitydoc::document", reference = %self, "reference served from cache");
                doc
            }
            _ => Box::new(self.load()?),
        };
        Ok(&**self.cached.insert(doc))
    }

    fn load(&self) -> OdmResult<Document> {
        let pk = self
            .pk
            .clone()
            .ok_or_else(|| OdmError::BrokenReference(self.document_type.clone()))?;
        let doc_type = self.instance.document_type(&self.document_type)?;
        debug!(target: "entitydoc::document", reference = %self, "loading reference");

        doc_type
            .get(pk.clone())?
            .ok_or_else(|| OdmError::ReferenceNotFound {
                document_type: self.document_type.clone(),
                pk: pk.to_string(),
            })
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.document_type == other.document_type && self.pk == other.pk
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pk {
            Some(pk) => write!(f, "Reference({}, {})", self.document_type, pk),
            None => write!(f, "Reference({}, unsaved)", self.document_type),
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("document_type", &self.document_type)
            .field("pk", &self.pk)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
