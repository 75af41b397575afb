//! codec layer for entitydoc
//!
//! Converts values across the boundary between documents and store
//! entities, in two steps:
//!
//! ```text
//!   Document ──encode_document──► Payload ──pack──► Entity ──► store
//!   Document ◄──decode_document── Payload ◄─unpack── Entity ◄── store
//! ```
//!
//! `pack`/`unpack` only deal with the primary key, key-valued fields and
//! timezones. The field codecs handle blobs, dictionaries, references,
//! embedded documents and lists according to the document schema.

mod entity;
mod error;
mod fields;

pub use entity::{pack, unpack, unpack_entity, Payload, PRIMARY_KEY};
pub use error::{CodecError, CodecResult};
pub use fields::{
    decode_document, decode_polymorphic, decode_value, encode_document, encode_value, escape_dict_key,
    unescape_dict_key, DICT_DOT_ESCAPE,
};
