//! collection layer for entitydoc
//!
//! A [`Collection`] wraps one entity kind and exposes keyed reads and writes
//! with batching, plus MongoDB-style filtered queries. Filters go through the
//! translator, which turns `$in` into several native queries whose results
//! are concatenated lazily by a [`QueryCursor`].
//!
//!  # Architecture
//!
//! ```text
//!   Filter ──► translate(seed, filter) ──► [Query, Query, ...]
//!                                                │
//!                                                ▼
//!   Collection ── get_multi / put_multi ──►  EntityStore  ◄── fetch ── QueryCursor
//!        │          (chunked, sequential)                     (one query at a time)
//!        ▼
//!   codec::pack / codec::unpack
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use entitydoc::collection::{Collection, Filter};
//! use entitydoc::store::{Kind, MemoryStore, Order};
//!
//! let users = Collection::new(Arc::new(MemoryStore::new()), Kind::new("User")?);
//! let filter = Filter::new().is_in("category", ["A", "B"]).op("age", "$gte", 18);
//! for payload in users.query(&filter, &[Order::parse("-age")], Some(10))? {
//!     println!("{:?}", payload?);
//! }
//! ```

#[allow(clippy::module_inception)]
mod collection;
mod config;
mod cursor;
mod error;
mod filter;
mod translate;

pub use collection::Collection;
pub use config::{CollectionConfig, DEFAULT_GET_CHUNK_SIZE, DEFAULT_PUT_CHUNK_SIZE};
pub use cursor::QueryCursor;
pub use error::{CollectionError, CollectionResult};
pub use filter::{Condition, Filter};
pub use translate::{translate, FilterOperator};
