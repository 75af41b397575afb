//! Collection configuration.

use serde::{Deserialize, Serialize};

use super::error::{CollectionError, CollectionResult};

/// Largest number of keys sent in one `get_multi` request.
pub const DEFAULT_GET_CHUNK_SIZE: usize = 1000;

/// Largest number of entities sent in one `put_multi` request.
pub const DEFAULT_PUT_CHUNK_SIZE: usize = 500;

/// Batching limits for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Keys per `get_multi` store call.
    pub get_chunk_size: usize,
    /// Entities per `put_multi` store call.
    pub put_chunk_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            get_chunk_size: DEFAULT_GET_CHUNK_SIZE,
            put_chunk_size: DEFAULT_PUT_CHUNK_SIZE,
        }
    }
}

impl CollectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the get chunk size.
    pub fn get_chunk_size(mut self, size: usize) -> Self {
        self.get_chunk_size = size;
        self
    }

    /// Set the put chunk size.
    pub fn put_chunk_size(mut self, size: usize) -> Self {
        self.put_chunk_size = size;
        self
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> CollectionResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CollectionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject chunk sizes that could never make progress.
    pub fn validate(&self) -> CollectionResult<()> {
        if self.get_chunk_size == 0 {
            return Err(CollectionError::InvalidConfig("get_chunk_size must be positive".into()));
        }
        if self.put_chunk_size == 0 {
            return Err(CollectionError::InvalidConfig("put_chunk_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectionConfig::default();
        assert_eq!(config.get_chunk_size, 1000);
        assert_eq!(config.put_chunk_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = CollectionConfig::from_json(r#"{"get_chunk_size": 10}"#).unwrap();
        assert_eq!(config, CollectionConfig::new().get_chunk_size(10));
    }

    #[test]
    fn test_zero_rejected() {
        assert!(CollectionConfig::new().put_chunk_size(0).validate().is_err());
        assert!(matches!(
            CollectionConfig::from_json(r#"{"get_chunk_size": 0}"#),
            Err(CollectionError::InvalidConfig(_))
        ));
        assert!(CollectionConfig::from_json("not json").is_err());
    }
}
