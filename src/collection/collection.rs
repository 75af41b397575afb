//! The collection abstraction over one entity kind.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::config::CollectionConfig;
use super::cursor::QueryCursor;
use super::error::{CollectionError, CollectionResult};
use super::filter::Filter;
use super::translate::translate;
use crate::codec::{pack, unpack, Payload};
use crate::store::{Entity, EntityStore, Identifier, Key, Kind, Order, StoreError};

/// A handle on one kind of the store.
///
/// Clone this to share it - the store handle is behind an Arc. No caching or
/// retrying happens here: every call goes to the store and every store error
/// comes back unchanged.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn EntityStore>,
    kind: Kind,
    config: CollectionConfig,
}

impl Collection {
    /// Create a collection with the default batching limits.
    pub fn new(store: Arc<dyn EntityStore>, kind: Kind) -> Self {
        Self {
            store,
            kind,
            config: CollectionConfig::default(),
        }
    }

    /// Create a collection with custom batching limits.
    pub fn with_config(store: Arc<dyn EntityStore>, kind: Kind, config: CollectionConfig) -> CollectionResult<Self> {
        config.validate()?;
        Ok(Self { store, kind, config })
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Build a key in this kind; `None` gives an incomplete key.
    pub fn key(&self, identifier: Option<Identifier>) -> CollectionResult<Key> {
        Ok(self.store.key(&self.kind, identifier)?)
    }

    // ==================== Reads ====================

    /// Fetch one entity by identifier.
    pub fn get(&self, identifier: Identifier) -> CollectionResult<Option<Payload>> {
        Ok(self.get_multi(&[identifier])?.pop().flatten())
    }

    /// Fetch many entities, one result slot per identifier.
    ///
    /// Identifiers are sent in chunks of at most `get_chunk_size`, one store
    /// call per chunk, sequentially. Missing entities show up as `None` in
    /// their slot.
    pub fn get_multi(&self, identifiers: &[Identifier]) -> CollectionResult<Vec<Option<Payload>>> {
        let keys = identifiers
            .iter()
            .map(|id| self.key(Some(id.clone())))
            .collect::<CollectionResult<Vec<_>>>()?;

        let mut results = Vec::with_capacity(keys.len());
        for (index, chunk) in keys.chunks(self.config.get_chunk_size).enumerate() {
            debug!(
                target: "entitydoc::collection",
                kind = %self.kind,
                chunk = index,
                size = chunk.len(),
                "get_multi chunk"
            );
            let found: HashMap<Key, Entity> = self
                .store
                .get_multi(chunk)?
                .into_iter()
                .map(|entity| (entity.key.clone(), entity))
                .collect();

            results.extend(chunk.iter().map(|key| unpack(found.get(key).cloned())));
        }
        Ok(results)
    }

    // ==================== Writes ====================

    /// Insert or update one entity and return its key.
    pub fn put(&self, payload: Payload, exclude_from_indexes: &[String]) -> CollectionResult<Key> {
        self.put_multi(vec![payload], exclude_from_indexes)?
            .pop()
            .ok_or_else(|| StoreError::Internal("store returned no key for a single put".into()).into())
    }

    /// Insert or update many entities; one key per payload, same order.
    ///
    /// Every payload is packed before the first store call. Chunks of at
    /// most `put_chunk_size` go out sequentially; a failing chunk aborts the
    /// rest without undoing the ones already written.
    pub fn put_multi(&self, payloads: Vec<Payload>, exclude_from_indexes: &[String]) -> CollectionResult<Vec<Key>> {
        let mut entities = payloads
            .into_iter()
            .map(|payload| pack(self.store.as_ref(), &self.kind, payload))
            .collect::<Result<Vec<_>, _>>()?;

        let total = entities.len();
        let mut keys = Vec::with_capacity(total);
        let mut index = 0;
        while !entities.is_empty() {
            let rest = entities.split_off(entities.len().min(self.config.put_chunk_size));
            let chunk = std::mem::replace(&mut entities, rest);
            let size = chunk.len();
            debug!(
                target: "entitydoc::collection",
                kind = %self.kind,
                chunk = index,
                size,
                "put_multi chunk"
            );

            let written = self.store.put_multi(chunk, exclude_from_indexes)?;
            if written.len() != size {
                return Err(CollectionError::Store(StoreError::Internal(format!(
                    "store returned {} keys for {} entities",
                    written.len(),
                    size
                ))));
            }
            keys.extend(written);
            index += 1;
        }
        Ok(keys)
    }

    /// Remove the entity stored under `key`.
    pub fn delete(&self, key: &Key) -> CollectionResult<()> {
        debug!(target: "entitydoc::collection", key = %key, "delete");
        Ok(self.store.delete(key)?)
    }

    // ==================== Queries ====================

    /// Run a filtered, ordered and limited query.
    ///
    /// The filter is translated up front (so unknown operators fail here);
    /// the returned cursor is lazy and walks the native queries in order.
    pub fn query(&self, filter: &Filter, order: &[Order], limit: Option<usize>) -> CollectionResult<QueryCursor> {
        let seed = self.store.query(&self.kind, order.to_vec());
        let queries = translate(seed, filter)?;
        Ok(QueryCursor::new(Arc::clone(&self.store), queries, limit))
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PRIMARY_KEY;
    use crate::store::{MemoryStore, Value};
    use serde_json::json;

    fn payload(fields: &[(&str, Value)]) -> Payload {
        fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    /// Seven rows with identifiers 5..=11.
    fn setup() -> (MemoryStore, Collection) {
        let store = MemoryStore::new();
        let collection = Collection::new(Arc::new(store.clone()), Kind::new("Model").unwrap());

        let rows = [
            ("A", 1.0),
            ("B", 2.5),
            ("B", 3.0),
            ("C", 4.22),
            ("A", 4.5),
            ("A", 0.5),
            ("A", 2.0),
        ];
        let payloads = rows
            .iter()
            .enumerate()
            .map(|(i, (category, property))| {
                payload(&[
                    (PRIMARY_KEY, Value::Integer(5 + i as i64)),
                    ("category", Value::from(*category)),
                    ("property", Value::Float(*property)),
                ])
            })
            .collect();
        collection.put_multi(payloads, &[]).unwrap();
        (store, collection)
    }

    fn run(collection: &Collection, filter: serde_json::Value) -> Vec<Payload> {
        let filter = Filter::from_json(&filter).unwrap();
        collection
            .query(&filter, &[], None)
            .unwrap()
            .collect::<CollectionResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_key() {
        let (_, collection) = setup();
        let key = collection.key(Some(Identifier::Id(3))).unwrap();
        assert_eq!(key.kind().as_str(), "Model");
        assert!(!collection.key(None).unwrap().is_complete());
        assert!(collection.key(Some(Identifier::from(""))).is_err());
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let (_, collection) = setup();
        let original = payload(&[("name", Value::from("goku")), ("power", Value::Integer(9001))]);

        let key = collection.put(original.clone(), &[]).unwrap();
        let identifier = key.id_or_name().cloned().unwrap();
        let fetched = collection.get(identifier.clone()).unwrap().unwrap();

        let mut expected = original;
        expected.insert(PRIMARY_KEY.to_string(), Value::from(identifier));
        assert_eq!(fetched, expected);
    }

    #[test]
    fn test_put_reuses_identifier() {
        let (store, collection) = setup();
        let key = collection
            .put(payload(&[(PRIMARY_KEY, Value::Integer(5)), ("category", Value::from("Z"))]), &[])
            .unwrap();

        assert_eq!(key.id_or_name(), Some(&Identifier::Id(5)));
        assert_eq!(store.len(collection.kind()), 7);
        let fetched = collection.get(Identifier::Id(5)).unwrap().unwrap();
        assert_eq!(fetched["category"], Value::from("Z"));
        assert!(!fetched.contains_key("property"));
    }

    #[test]
    fn test_get_missing() {
        let (_, collection) = setup();
        assert_eq!(collection.get(Identifier::Id(404)).unwrap(), None);
    }

    #[test]
    fn test_get_multi_empty() {
        let (store, collection) = setup();
        let before = store.stats().get_multi_calls;
        assert!(collection.get_multi(&[]).unwrap().is_empty());
        assert_eq!(store.stats().get_multi_calls, before);
    }

    #[test]
    fn test_get_multi_chunks_and_realigns() {
        let store = MemoryStore::with_batch_limit(2);
        let config = CollectionConfig::new().get_chunk_size(2).put_chunk_size(2);
        let collection =
            Collection::with_config(Arc::new(store.clone()), Kind::new("Model").unwrap(), config).unwrap();

        let payloads = (1..=5)
            .map(|i| payload(&[(PRIMARY_KEY, Value::Integer(i * 10)), ("n", Value::Integer(i))]))
            .collect();
        let keys = collection.put_multi(payloads, &[]).unwrap();
        assert_eq!(keys.len(), 5);
        assert_eq!(store.stats().put_multi_calls, 3);

        let identifiers: Vec<Identifier> = [50, 7, 10, 40, 99, 30, 20]
            .into_iter()
            .map(Identifier::Id)
            .collect();
        let results = collection.get_multi(&identifiers).unwrap();

        assert_eq!(results.len(), 7);
        assert_eq!(store.stats().get_multi_calls, 4);
        let found: Vec<Option<i64>> = results
            .iter()
            .map(|r| r.as_ref().and_then(|p| p["n"].as_i64()))
            .collect();
        assert_eq!(found, vec![Some(5), None, Some(1), Some(4), None, Some(3), Some(2)]);
    }

    #[test]
    fn test_get_multi_without_chunking_hits_store_limit() {
        let store = MemoryStore::with_batch_limit(2);
        let collection = Collection::new(Arc::new(store), Kind::new("Model").unwrap());
        let identifiers: Vec<Identifier> = (1..=3).map(Identifier::Id).collect();

        let err = collection.get_multi(&identifiers).unwrap_err();
        assert!(err.is_store_error());
    }

    #[test]
    fn test_put_multi_rejects_bad_primary_key_before_writing() {
        let (store, collection) = setup();
        let before = store.stats().put_multi_calls;
        let result = collection.put_multi(
            vec![
                payload(&[("ok", Value::Bool(true))]),
                payload(&[(PRIMARY_KEY, Value::Float(1.5))]),
            ],
            &[],
        );

        assert!(matches!(result, Err(CollectionError::Codec(_))));
        assert_eq!(store.stats().put_multi_calls, before);
    }

    #[test]
    fn test_delete() {
        let (store, collection) = setup();
        let key = collection.key(Some(Identifier::Id(5))).unwrap();
        collection.delete(&key).unwrap();

        assert_eq!(store.len(collection.kind()), 6);
        assert_eq!(collection.get(Identifier::Id(5)).unwrap(), None);
    }

    #[test]
    fn test_query_equality() {
        let (_, collection) = setup();
        assert_eq!(run(&collection, json!({})).len(), 7);
        assert_eq!(run(&collection, json!({"category": "A"})).len(), 4);
        assert_eq!(run(&collection, json!({"category": {"$eq": "A"}})).len(), 4);
    }

    #[test]
    fn test_query_in() {
        let (_, collection) = setup();
        assert_eq!(run(&collection, json!({"category": {"$in": ["B", "C"]}})).len(), 3);
    }

    #[test]
    fn test_query_primary_key_range() {
        let (_, collection) = setup();
        assert_eq!(run(&collection, json!({"_id": {"$lt": 8}})).len(), 3);
        assert_eq!(run(&collection, json!({"_id": {"$lte": 8}})).len(), 4);

        let rows = run(&collection, json!({"_id": 9}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][PRIMARY_KEY], Value::Integer(9));
    }

    #[test]
    fn test_query_property_range() {
        let (_, collection) = setup();
        assert_eq!(run(&collection, json!({"property": {"$gt": 4.22}})).len(), 1);
        assert_eq!(run(&collection, json!({"property": {"$gte": 4.22}})).len(), 2);
    }

    #[test]
    fn test_query_conjunction() {
        let (_, collection) = setup();
        let rows = run(&collection, json!({"category": "A", "property": {"$gte": 2.0}}));

        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row["category"], Value::from("A"));
            assert!(row["property"].as_f64().unwrap() >= 2.0);
        }
    }

    #[test]
    fn test_query_in_concatenates_per_value() {
        let store = MemoryStore::new();
        let collection = Collection::new(Arc::new(store.clone()), Kind::new("Model").unwrap());
        // stored out of category order on purpose
        let categories = ["C", "A", "B", "C", "A", "C"];
        let payloads = categories
            .iter()
            .map(|c| payload(&[("category", Value::from(*c))]))
            .collect();
        collection.put_multi(payloads, &[]).unwrap();

        let rows = run(&collection, json!({"category": {"$in": ["A", "B", "C"]}}));
        let order: Vec<&str> = rows.iter().map(|r| r["category"].as_str().unwrap()).collect();
        assert_eq!(order, vec!["A", "A", "B", "C", "C", "C"]);
        assert_eq!(store.stats().query_calls, 3);
    }

    #[test]
    fn test_query_order_and_limit() {
        let (store, collection) = setup();
        let filter = Filter::new().is_in("category", ["B", "A"]);
        let rows: Vec<Payload> = collection
            .query(&filter, &[Order::parse("-property")], Some(3))
            .unwrap()
            .collect::<CollectionResult<_>>()
            .unwrap();

        let properties: Vec<f64> = rows.iter().map(|r| r["property"].as_f64().unwrap()).collect();
        // B rows first in descending order, then the best A row
        assert_eq!(properties, vec![3.0, 2.5, 4.5]);

        let before = store.stats().query_calls;
        let first: Vec<_> = collection.query(&filter, &[], Some(2)).unwrap().collect();
        assert_eq!(first.len(), 2);
        // limit reached inside the first variant, the second is never sent
        assert_eq!(store.stats().query_calls, before + 1);
    }

    #[test]
    fn test_query_is_lazy() {
        let (store, collection) = setup();
        let before = store.stats().query_calls;
        let cursor = collection
            .query(&Filter::new().is_in("category", ["A", "B"]), &[], None)
            .unwrap();

        assert_eq!(cursor.pending_queries(), 2);
        assert_eq!(store.stats().query_calls, before);
    }

    #[test]
    fn test_query_unknown_operator() {
        let (_, collection) = setup();
        let filter = Filter::new().op("category", "$regex", "A.*");
        assert!(matches!(
            collection.query(&filter, &[], None),
            Err(CollectionError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let config = CollectionConfig::new().get_chunk_size(0);
        let result = Collection::with_config(Arc::new(MemoryStore::new()), Kind::new("Model").unwrap(), config);
        assert!(matches!(result, Err(CollectionError::InvalidConfig(_))));
    }
}
