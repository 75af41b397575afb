//! entitydoc - object-document mapping over a kind-partitioned entity store
//!
//! Schema-defined documents (typed fields, validators, references, embedded
//! documents) are persisted into a schemaless key/entity store. Each document
//! type maps to one kind; MongoDB-style filters are translated into native
//! store queries, with `$in` emulated by running one query per value.
//!
//! ```text
//!   document    Instance, DocumentType, Document, Reference
//!      │
//!   collection  Collection, Filter ──translate──► Query*
//!      │
//!   codec       pack / unpack, field codecs
//!      │
//!   store       EntityStore (MemoryStore in process)
//! ```
//!
//! `schema` holds the field types, validators and the registry of document
//! types shared by the layers above.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use entitydoc::collection::Filter;
//! use entitydoc::document::Instance;
//! use entitydoc::schema::{DocumentTemplate, FieldType};
//! use entitydoc::store::MemoryStore;
//!
//! let instance = Instance::new(Arc::new(MemoryStore::new()));
//! let items = instance.register(
//!     DocumentTemplate::new("Item")
//!         .add_field("category", FieldType::String)
//!         .add_field("score", FieldType::Float),
//! )?;
//!
//! let mut item = items.build([("category", "A")])?;
//! item.commit()?;
//!
//! let filter = Filter::new().is_in("category", ["A", "B"]);
//! for doc in items.find(&filter, &[], Some(10))? {
//!     println!("{:?}", doc?);
//! }
//! ```

pub mod codec;
pub mod collection;
pub mod document;
pub mod schema;
pub mod store;
