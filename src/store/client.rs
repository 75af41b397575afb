//! The entity store collaborator interface.

use super::entity::Entity;
use super::error::{StoreError, StoreResult};
use super::query::{Order, Query};
use super::types::{Identifier, Key, Kind};

/// Lazy stream of query results.
pub type EntityStream = Box<dyn Iterator<Item = StoreResult<Entity>> + Send>;

/// A kind-partitioned entity store.
///
/// Implementations are treated as a black box: transport, authentication and
/// consistency are their own concern. Every method is a blocking call.
pub trait EntityStore: Send + Sync {
    /// Fetch the entities for `keys`.
    ///
    /// Only entities that exist are returned, in no particular order.
    fn get_multi(&self, keys: &[Key]) -> StoreResult<Vec<Entity>>;

    /// Insert or overwrite `entities`.
    ///
    /// Incomplete keys get an identifier allocated. Returns the resulting
    /// complete keys in input order.
    fn put_multi(&self, entities: Vec<Entity>, exclude_from_indexes: &[String]) -> StoreResult<Vec<Key>>;

    /// Remove the entity stored under `key`.
    fn delete(&self, key: &Key) -> StoreResult<()>;

    /// Run a native query, yielding at most `limit` entities.
    fn fetch(&self, query: &Query, limit: Option<usize>) -> StoreResult<EntityStream>;

    /// Build a key for `kind`; `None` gives an incomplete key.
    fn key(&self, kind: &Kind, identifier: Option<Identifier>) -> StoreResult<Key> {
        match identifier {
            Some(identifier) => Key::new(kind.clone(), identifier).map_err(StoreError::from),
            None => Ok(Key::incomplete(kind.clone())),
        }
    }

    /// Start a native query on `kind`.
    fn query(&self, kind: &Kind, order: Vec<Order>) -> Query {
        Query::new(kind.clone(), order)
    }
}
