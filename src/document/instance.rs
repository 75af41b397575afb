//! The instance: one store handle plus the document types registered on it.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{OdmError, OdmResult};
use super::facade::DocumentType;
use crate::collection::{Collection, CollectionConfig, CollectionError};
use crate::schema::{DocumentSchema, DocumentTemplate, Registry};
use crate::store::{EntityStore, Kind};

/// Instance configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Batching limits of every collection the instance opens.
    pub collection: CollectionConfig,
}

impl InstanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, config: CollectionConfig) -> Self {
        self.collection = config;
        self
    }

    /// Load a configuration from JSON; absent keys keep their defaults.
    pub fn from_json(json: &str) -> OdmResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CollectionError::InvalidConfig(e.to_string()))?;
        config.collection.validate()?;
        Ok(config)
    }
}

/// Shared entry point for document types.
///
/// Clone this to share it - it uses Arc internally. Documents, document
/// types and references all carry a clone, so everything they do goes
/// through the same store and registry.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

struct InstanceInner {
    store: Arc<dyn EntityStore>,
    registry: RwLock<Registry>,
    config: InstanceConfig,
}

impl Instance {
    /// Create an instance with the default configuration.
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                store,
                registry: RwLock::new(Registry::new()),
                config: InstanceConfig::default(),
            }),
        }
    }

    /// Create an instance with a custom configuration.
    pub fn with_config(store: Arc<dyn EntityStore>, config: InstanceConfig) -> OdmResult<Self> {
        config.collection.validate()?;
        Ok(Self {
            inner: Arc::new(InstanceInner {
                store,
                registry: RwLock::new(Registry::new()),
                config,
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.inner.config
    }

    // ==================== Registration ====================

    /// Compile and register a document type.
    pub fn register(&self, template: DocumentTemplate) -> OdmResult<DocumentType> {
        let schema = self.inner.registry.write().register(template)?;
        debug!(
            target: "entitydoc::document",
            name = %schema.name,
            embedded = schema.is_embedded(),
            "document type available"
        );
        Ok(DocumentType::from_schema(self.clone(), schema))
    }

    /// Get a handle on a registered document type.
    pub fn document_type(&self, name: &str) -> OdmResult<DocumentType> {
        self.schema(name)
            .map(|schema| DocumentType::from_schema(self.clone(), schema))
            .ok_or_else(|| OdmError::UnknownDocumentType(name.to_string()))
    }

    pub fn schema(&self, name: &str) -> Option<Arc<DocumentSchema>> {
        self.inner.registry.read().get(name)
    }

    /// Registered type names, sorted.
    pub fn registered(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Check if `name` is `ancestor` or one of its descendants.
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> bool {
        self.inner.registry.read().is_subtype(name, ancestor)
    }

    /// `name` followed by every registered descendant.
    pub fn lineage(&self, name: &str) -> Vec<String> {
        self.inner.registry.read().lineage(name)
    }

    pub(crate) fn resolve_subtype(&self, declared: &str, discriminator: Option<&str>) -> Option<Arc<DocumentSchema>> {
        self.inner.registry.read().resolve_subtype(declared, discriminator)
    }

    // ==================== Collections ====================

    /// Open a collection on `kind` with the instance's batching limits.
    pub fn collection(&self, kind: Kind) -> OdmResult<Collection> {
        Ok(Collection::with_config(
            Arc::clone(&self.inner.store),
            kind,
            self.inner.config.collection,
        )?)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("config", &self.inner.config)
            .field("registered", &self.registered())
            .finish()
    }
}
