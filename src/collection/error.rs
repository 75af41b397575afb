//! Collection errors.

use thiserror::Error;

use crate::codec::CodecError;
use crate::store::StoreError;

/// Result type for collection operations.
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Errors raised by the collection abstraction and the filter translator.
#[derive(Debug, Clone, Error)]
pub enum CollectionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The filter names an operator the translator has no entry for.
    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),

    /// The filter is malformed (e.g. `$in` without a list operand).
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CollectionError {
    /// Check if the error came from the store itself.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            CollectionError::Store(_) | CollectionError::Codec(CodecError::Store(_))
        )
    }
}
