//! entity store layer for entitydoc
//!
//! this module defines the contract of the schemaless key/entity store the
//! mapping layer persists into. The upper layers (codec, collection, document)
//! only talk to the store through [`EntityStore`].
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     EntityStore                             │
//! │   (get_multi, put_multi, delete, fetch(query, limit))       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │     Key     │       │   Entity    │       │    Query    │
//!  │(kind + id)  │       │ (properties)│       │ (conjuncts) │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! [`MemoryStore`] is an in-process implementation used for tests and for
//! embedding the mapping layer without a remote store.
//!
//! # Usage
//!
//! ```ignore
//! use entitydoc::store::{EntityStore, Entity, Kind, MemoryStore, PropertyOperator};
//!
//! let store = MemoryStore::new();
//! let kind = Kind::new("User")?;
//!
//! let mut entity = Entity::new(store.key(&kind, None)?);
//! entity.set("name", "Alice");
//! let keys = store.put_multi(vec![entity], &[])?;
//!
//! let mut query = store.query(&kind, vec![]);
//! query.add_filter("name", PropertyOperator::Equal, "Alice");
//! for entity in store.fetch(&query, None)? {
//!     println!("{:?}", entity?);
//! }
//! ```

mod client;
mod entity;
mod error;
mod memory;
mod query;
mod types;
mod value;

pub use client::{EntityStore, EntityStream};
pub use entity::Entity;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, StoreStats};
pub use query::{Order, PropertyFilter, PropertyOperator, Query, SortDirection, KEY_PROPERTY};
pub use types::{Identifier, InvalidNameError, Key, Kind};
pub use value::Value;
