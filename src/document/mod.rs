//! Document layer for entitydoc
//!
//! The user-facing object mapper. Templates are registered on an
//! [`Instance`], which hands out [`DocumentType`] handles; those create,
//! commit, query and delete [`Document`]s.
//!
//! ```text
//!   Instance ── register(template) ──► DocumentType
//!      │                                   │
//!      │                       create / build / find / get
//!      ▼                                   ▼
//!   Registry                            Document ── set / commit / delete / reload
//!                                          │
//!                         encode_document  │  decode_polymorphic
//!                                          ▼
//!                                      Collection ──► EntityStore
//! ```
//!
//! # Example
//!
//! ```ignore
//! let instance = Instance::new(Arc::new(MemoryStore::new()));
//! let users = instance.register(
//!     DocumentTemplate::new("User")
//!         .add_required_field("email", FieldType::Email)
//!         .add_field("name", FieldType::String),
//! )?;
//!
//! let mut goku = users.build([("email", "goku@sayen.com"), ("name", "Goku")])?;
//! goku.commit()?;
//!
//! let found = users.find_one(&Filter::new().eq("name", "Goku"), &[])?;
//! ```

#[allow(clippy::module_inception)]
mod document;
mod error;
mod facade;
mod instance;
mod reference;

pub use document::Document;
pub use error::{OdmError, OdmResult};
pub use facade::{DocumentCursor, DocumentType};
pub use instance::{Instance, InstanceConfig};
pub use reference::Reference;
