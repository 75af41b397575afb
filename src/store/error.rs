//! Store layer error types
//!
//! All errors the entity store collaborator can raise are defined here.

use thiserror::Error;

use crate::store::types::{InvalidNameError, Key};

/// the main error type for entity store operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// the key or kind is malformed
    #[error("invalid key: {0}")]
    InvalidKey(#[from] InvalidNameError),

    /// the operation needs a complete key but got an incomplete one
    #[error("incomplete key: {0}")]
    IncompleteKey(Key),

    /// the requested entity does not exist
    #[error("entity not found: {0}")]
    NotFound(Key),

    /// the request carries more entities than the store accepts at once
    #[error("batch of {size} entities exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// the query uses a property or operator the store cannot serve
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// the store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// check if this error indicates the entity doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// check if this error was caused by the request itself
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidKey(_)
                | StoreError::IncompleteKey(_)
                | StoreError::BatchTooLarge { .. }
                | StoreError::InvalidQuery(_)
        )
    }
}

/// result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Identifier, Kind};

    #[test]
    fn test_error_classification() {
        let key = Key::new(Kind::new("User").unwrap(), Identifier::Id(1)).unwrap();
        let not_found = StoreError::NotFound(key);
        assert!(not_found.is_not_found());
        assert!(!not_found.is_invalid_request());

        let too_large = StoreError::BatchTooLarge { size: 10, limit: 5 };
        assert!(!too_large.is_not_found());
        assert!(too_large.is_invalid_request());
        assert_eq!(
            too_large.to_string(),
            "batch of 10 entities exceeds the store limit of 5"
        );
    }
}
