//! In-process entity store.
//!
//! `MemoryStore` implements [`EntityStore`] on top of ordered maps. It follows
//! the remote store's observable behaviour closely enough to run the whole
//! mapping layer against it: identifiers are allocated on write, naive
//! datetimes come back as UTC timestamps, unindexed properties never match a
//! filter, and batch requests above the configured limit are rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::client::{EntityStore, EntityStream};
use super::entity::Entity;
use super::error::{StoreError, StoreResult};
use super::query::{Order, PropertyFilter, PropertyOperator, Query, SortDirection, KEY_PROPERTY};
use super::types::{Identifier, Key, Kind};
use super::value::Value;

/// Snapshot of how many calls the store has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub get_multi_calls: usize,
    pub put_multi_calls: usize,
    pub delete_calls: usize,
    pub query_calls: usize,
    pub entities_written: usize,
}

#[derive(Default)]
struct StoreCounters {
    get_multi_calls: AtomicUsize,
    put_multi_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    query_calls: AtomicUsize,
    entities_written: AtomicUsize,
}

impl StoreCounters {
    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, AtomicOrdering::Relaxed);
    }

    fn snapshot(&self) -> StoreStats {
        StoreStats {
            get_multi_calls: self.get_multi_calls.load(AtomicOrdering::Relaxed),
            put_multi_calls: self.put_multi_calls.load(AtomicOrdering::Relaxed),
            delete_calls: self.delete_calls.load(AtomicOrdering::Relaxed),
            query_calls: self.query_calls.load(AtomicOrdering::Relaxed),
            entities_written: self.entities_written.load(AtomicOrdering::Relaxed),
        }
    }
}

/// A stored entity plus the properties excluded from indexes at write time.
#[derive(Debug, Clone)]
struct StoredEntity {
    entity: Entity,
    unindexed: BTreeSet<String>,
}

type KindTable = BTreeMap<Identifier, StoredEntity>;

/// The in-memory store.
///
/// Clone this to share it - it uses Arc internally.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    kinds: RwLock<BTreeMap<Kind, KindTable>>,
    next_id: AtomicI64,
    batch_limit: Option<usize>,
    counters: StoreCounters,
}

impl MemoryStore {
    /// Create an empty store without a batch limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store rejecting batches larger than `limit`.
    pub fn with_batch_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(MemoryStoreInner {
                batch_limit: Some(limit),
                ..Default::default()
            }),
        }
    }

    /// Calls served so far.
    pub fn stats(&self) -> StoreStats {
        self.inner.counters.snapshot()
    }

    /// Number of entities stored under `kind`.
    pub fn len(&self, kind: &Kind) -> usize {
        self.inner.kinds.read().get(kind).map_or(0, |table| table.len())
    }

    pub fn is_empty(&self, kind: &Kind) -> bool {
        self.len(kind) == 0
    }

    fn check_batch(&self, size: usize) -> StoreResult<()> {
        match self.inner.batch_limit {
            Some(limit) if size > limit => Err(StoreError::BatchTooLarge { size, limit }),
            _ => Ok(()),
        }
    }

    fn allocate_id(&self, table: Option<&KindTable>) -> Identifier {
        loop {
            let id = self.inner.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1;
            let candidate = Identifier::Id(id);
            if table.map_or(true, |t| !t.contains_key(&candidate)) {
                return candidate;
            }
        }
    }
}

impl EntityStore for MemoryStore {
    fn get_multi(&self, keys: &[Key]) -> StoreResult<Vec<Entity>> {
        StoreCounters::bump(&self.inner.counters.get_multi_calls, 1);
        self.check_batch(keys.len())?;

        let kinds = self.inner.kinds.read();
        let mut found = BTreeMap::new();
        for key in keys {
            let identifier = key
                .id_or_name()
                .ok_or_else(|| StoreError::IncompleteKey(key.clone()))?;
            if let Some(stored) = kinds.get(key.kind()).and_then(|t| t.get(identifier)) {
                found.insert(key.clone(), stored.entity.clone());
            }
        }

        // Results come back in key order, not request order.
        Ok(found.into_values().collect())
    }

    fn put_multi(&self, entities: Vec<Entity>, exclude_from_indexes: &[String]) -> StoreResult<Vec<Key>> {
        StoreCounters::bump(&self.inner.counters.put_multi_calls, 1);
        self.check_batch(entities.len())?;

        for entity in &entities {
            if let Some(identifier) = entity.key.id_or_name() {
                identifier.validate()?;
            }
        }

        let unindexed: BTreeSet<String> = exclude_from_indexes.iter().cloned().collect();
        let mut kinds = self.inner.kinds.write();
        let mut keys = Vec::with_capacity(entities.len());

        for mut entity in entities {
            let kind = entity.kind().clone();
            let key = match entity.key.id_or_name() {
                Some(_) => entity.key.clone(),
                None => {
                    let identifier = self.allocate_id(kinds.get(&kind));
                    entity.key.clone().completed(identifier)
                }
            };
            entity.key = key.clone();
            for value in entity.properties.values_mut() {
                normalize_timestamps(value);
            }

            let identifier = key
                .id_or_name()
                .cloned()
                .ok_or_else(|| StoreError::Internal("key left incomplete after allocation".into()))?;
            kinds.entry(kind).or_default().insert(
                identifier,
                StoredEntity {
                    entity,
                    unindexed: unindexed.clone(),
                },
            );
            keys.push(key);
        }

        StoreCounters::bump(&self.inner.counters.entities_written, keys.len());
        Ok(keys)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        StoreCounters::bump(&self.inner.counters.delete_calls, 1);
        let identifier = key
            .id_or_name()
            .ok_or_else(|| StoreError::IncompleteKey(key.clone()))?;

        let mut kinds = self.inner.kinds.write();
        if let Some(table) = kinds.get_mut(key.kind()) {
            table.remove(identifier);
        }
        Ok(())
    }

    fn fetch(&self, query: &Query, limit: Option<usize>) -> StoreResult<EntityStream> {
        StoreCounters::bump(&self.inner.counters.query_calls, 1);

        for filter in query.filters() {
            if filter.property == KEY_PROPERTY && filter.value.as_key().is_none() {
                return Err(StoreError::InvalidQuery(format!(
                    "{} filter expects a key, got {}",
                    KEY_PROPERTY,
                    filter.value.type_name()
                )));
            }
        }

        let kinds = self.inner.kinds.read();
        let mut matched: Vec<&StoredEntity> = match kinds.get(query.kind()) {
            Some(table) => table
                .values()
                .filter(|stored| query.filters().iter().all(|f| matches_filter(stored, f)))
                .filter(|stored| query.order().iter().all(|o| is_sortable(stored, o)))
                .collect(),
            None => Vec::new(),
        };

        if !query.order().is_empty() {
            matched.sort_by(|a, b| compare_by_order(&a.entity, &b.entity, query.order()));
        }

        let take = limit.unwrap_or(usize::MAX);
        let results: Vec<StoreResult<Entity>> = matched
            .into_iter()
            .take(take)
            .map(|stored| Ok(stored.entity.clone()))
            .collect();

        Ok(Box::new(results.into_iter()))
    }
}

/// Replace naive datetimes with UTC timestamps, as the remote store does.
fn normalize_timestamps(value: &mut Value) {
    match value {
        Value::DateTime(naive) => *value = Value::Timestamp(naive.and_utc()),
        Value::Array(items) => items.iter_mut().for_each(normalize_timestamps),
        Value::Entity(map) => map.values_mut().for_each(normalize_timestamps),
        _ => {}
    }
}

fn property_value<'a>(entity: &'a Entity, property: &str) -> Option<std::borrow::Cow<'a, Value>> {
    if property == KEY_PROPERTY {
        Some(std::borrow::Cow::Owned(Value::Key(entity.key.clone())))
    } else {
        entity.get(property).map(std::borrow::Cow::Borrowed)
    }
}

fn matches_filter(stored: &StoredEntity, filter: &PropertyFilter) -> bool {
    if stored.unindexed.contains(&filter.property) {
        return false;
    }
    let Some(value) = property_value(&stored.entity, &filter.property) else {
        return false;
    };

    // Array properties match when any element does.
    match value.as_ref() {
        Value::Array(items) => items.iter().any(|item| compare_op(item, filter)),
        single => compare_op(single, filter),
    }
}

fn compare_op(value: &Value, filter: &PropertyFilter) -> bool {
    let ord = value.compare(&filter.value);
    match filter.operator {
        PropertyOperator::Equal => ord.is_eq(),
        PropertyOperator::GreaterThan => ord.is_gt(),
        PropertyOperator::GreaterThanOrEqual => ord.is_ge(),
        PropertyOperator::LessThan => ord.is_lt(),
        PropertyOperator::LessThanOrEqual => ord.is_le(),
    }
}

fn is_sortable(stored: &StoredEntity, order: &Order) -> bool {
    order.property == KEY_PROPERTY
        || (stored.entity.contains(&order.property) && !stored.unindexed.contains(&order.property))
}

fn compare_by_order(a: &Entity, b: &Entity, order: &[Order]) -> std::cmp::Ordering {
    for spec in order {
        let (Some(va), Some(vb)) = (property_value(a, &spec.property), property_value(b, &spec.property)) else {
            continue;
        };
        let ord = va.compare(&vb);
        let ord = match spec.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        if ord.is_ne() {
            return ord;
        }
    }
    a.key.cmp(&b.key)
}
