//! Codec error types.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while converting between documents and entities.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The primary-key value cannot be turned into a key.
    #[error("primary key must be an integer, a string or a key, got {0}")]
    InvalidPrimaryKey(&'static str),

    /// A stored value does not have the shape the field expects.
    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// A reference points at a document that was never persisted.
    #[error("cannot reference a {0} document that has not been created yet")]
    UnsavedReference(String),

    /// A reference value targets a different document type than declared.
    #[error("field '{field}' expects a reference to {expected}, got {found}")]
    WrongReferenceType {
        field: String,
        expected: String,
        found: String,
    },

    /// An embedded or referenced document type is not registered.
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    /// A discriminator names a type outside the declared type's offspring.
    #[error("'{discriminator}' is not a registered subtype of {declared}")]
    UnknownSubtype {
        declared: String,
        discriminator: String,
    },

    /// Opaque blob (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CodecError {
    pub(crate) fn mismatch(field: &str, expected: impl Into<String>, found: &str) -> Self {
        CodecError::TypeMismatch {
            field: field.to_string(),
            expected: expected.into(),
            found: found.to_string(),
        }
    }
}
