//! Schema module for document type definitions.
//!
//! A [`DocumentTemplate`] declares fields, validators and inheritance. The
//! [`Registry`] compiles templates into immutable [`DocumentSchema`]s at
//! registration time, rejecting field types the entity store cannot hold,
//! and keeps the offspring sets used for subtype dispatch.

mod registry;
#[allow(clippy::module_inception)]
mod schema;
mod types;
mod value;

pub use registry::{Registry, DEFAULT_PRIMARY_KEY_FIELD, DISCRIMINATOR_FIELD};
pub use schema::{DocumentSchema, DocumentTemplate, SchemaError, SchemaResult};
pub use types::{FieldDef, FieldType, Validator, ValidatorFn, DISCRIMINATOR_ATTRIBUTE, PRIMARY_KEY_ATTRIBUTE};
pub use value::FieldValue;
