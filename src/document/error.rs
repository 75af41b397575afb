//! Document façade errors.

use thiserror::Error;

use crate::codec::CodecError;
use crate::collection::CollectionError;
use crate::schema::SchemaError;

/// Result type for document operations.
pub type OdmResult<T> = Result<T, OdmError>;

/// Errors surfaced by document operations.
#[derive(Debug, Clone, Error)]
pub enum OdmError {
    /// The operation needs a persisted document.
    #[error("document doesn't exist in the store: {0}")]
    NotCreated(String),

    /// Required-field, io or store-side validation failed during commit,
    /// or a value was rejected on assignment.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("delete failed: {0}")]
    Delete(String),

    /// Fetch on a reference without primary key.
    #[error("cannot retrieve a {0} reference without primary key")]
    BrokenReference(String),

    #[error("referenced {document_type} document {pk} not found")]
    ReferenceNotFound { document_type: String, pk: String },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("unknown field '{field}' on {document_type}")]
    UnknownField { document_type: String, field: String },

    /// Embedded document types have no kind of their own.
    #[error("{0} is an embedded document type and cannot be stored on its own")]
    Embedded(String),

    #[error("collection error: {0}")]
    Collection(#[from] CollectionError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl OdmError {
    pub fn is_not_created(&self) -> bool {
        matches!(self, OdmError::NotCreated(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, OdmError::Validation(_))
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, OdmError::Delete(_))
    }

    /// Check if a reference could not be resolved.
    pub fn is_reference_error(&self) -> bool {
        matches!(self, OdmError::BrokenReference(_) | OdmError::ReferenceNotFound { .. })
    }

    /// Message without the variant prefix, used when folding errors into a
    /// single validation failure.
    pub(crate) fn into_message(self) -> String {
        match self {
            OdmError::Validation(msg) => msg,
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(OdmError::NotCreated("User".into()).is_not_created());
        assert!(OdmError::BrokenReference("User".into()).is_reference_error());
        assert!(OdmError::ReferenceNotFound {
            document_type: "User".into(),
            pk: "5".into()
        }
        .is_reference_error());
        assert!(!OdmError::Delete("gone".into()).is_validation());
    }

    #[test]
    fn test_into_message() {
        assert_eq!(OdmError::Validation("email is required".into()).into_message(), "email is required");
        assert_eq!(
            OdmError::Delete("unreachable".into()).into_message(),
            "delete failed: unreachable"
        );
    }
}
