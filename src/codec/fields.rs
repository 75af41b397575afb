//! Schema-driven field codecs.
//!
//! Converts a document's in-memory field values into a payload keyed by
//! stored field names, and back. Field types with a dedicated codec:
//!
//! | field type   | in memory                 | stored                          |
//! |--------------|---------------------------|---------------------------------|
//! | `Bytes`      | `Opaque(json)`            | `Blob` (MessagePack)            |
//! | `Dict`       | `Dict`                    | `Entity`, `.` in keys escaped   |
//! | `Reference`  | `Reference`               | `Key` of the referenced kind    |
//! | `Embedded`   | `Embedded(Document)`      | `Entity`, `_cls` on child types |
//! | `DateTime`   | naive `DateTime`          | `DateTime` / `Timestamp`        |
//! | `List`       | `List`                    | `Array`, element-wise           |

use std::collections::BTreeMap;

use super::entity::Payload;
use super::error::{CodecError, CodecResult};
use crate::document::{Document, DocumentType, Instance, Reference};
use crate::schema::{FieldType, FieldValue, DISCRIMINATOR_ATTRIBUTE};
use crate::store::{Key, StoreError, Value};

/// Stand-in for `.` in stored dictionary keys.
pub const DICT_DOT_ESCAPE: &str = "\u{FF0E}";

pub fn escape_dict_key(key: &str) -> String {
    key.replace('.', DICT_DOT_ESCAPE)
}

pub fn unescape_dict_key(key: &str) -> String {
    key.replace(DICT_DOT_ESCAPE, ".")
}

// ==================== Encoding ====================

/// Encode a document into a payload.
///
/// Unset fields are left out; a null primary key is left out too so the
/// store allocates one. Formatted strings are rendered from the current
/// field values.
pub fn encode_document(doc: &Document) -> CodecResult<Payload> {
    let doc_type = doc.document_type();
    let instance = doc_type.instance();
    let mut payload = Payload::new();

    for field in &doc_type.schema().fields {
        let encoded = match &field.field_type {
            FieldType::FormattedString(template) => Some(Value::Text(render_template(template, doc.data()))),
            field_type => match doc.get(&field.name) {
                None => None,
                Some(value) if field.is_primary_key() && value.is_null() => None,
                Some(value) => encode_value(instance, &field.name, field_type, value)?,
            },
        };
        if let Some(value) = encoded {
            payload.insert(field.stored_name().to_string(), value);
        }
    }
    Ok(payload)
}

/// Encode one value; `None` means the field is omitted.
pub fn encode_value(
    instance: &Instance,
    field: &str,
    field_type: &FieldType,
    value: &FieldValue,
) -> CodecResult<Option<Value>> {
    let encoded = match (field_type, value) {
        (FieldType::Dict, FieldValue::Null) => return Ok(None),
        (_, FieldValue::Null) => Value::Null,
        (FieldType::Boolean, FieldValue::Bool(b)) => Value::Bool(*b),
        (FieldType::Integer | FieldType::Number | FieldType::Identifier, FieldValue::Integer(i)) => Value::Integer(*i),
        (FieldType::Float, FieldValue::Integer(i)) => Value::Float(*i as f64),
        (FieldType::Float | FieldType::Number, FieldValue::Float(x)) => Value::Float(*x),
        (
            FieldType::String | FieldType::Url | FieldType::Email | FieldType::FormattedString(_) | FieldType::Identifier,
            FieldValue::String(s),
        ) => Value::Text(s.clone()),
        (FieldType::DateTime, FieldValue::DateTime(dt)) => Value::DateTime(*dt),
        (FieldType::Dict, FieldValue::Dict(map)) => {
            if map.is_empty() {
                return Ok(None);
            }
            let mut escaped = BTreeMap::new();
            for (key, item) in map {
                escaped.insert(escape_dict_key(key), encode_plain(field, item)?);
            }
            Value::Entity(escaped)
        }
        (FieldType::Bytes, FieldValue::Opaque(json)) => {
            Value::Blob(rmp_serde::to_vec(json).map_err(|e| CodecError::Serialization(e.to_string()))?)
        }
        (FieldType::Reference(target), FieldValue::Reference(reference)) => {
            Value::Key(reference_key(instance, field, target, reference)?)
        }
        (FieldType::Embedded(declared), FieldValue::Embedded(doc)) => {
            let actual = doc.document_type().name();
            if !instance.is_subtype(actual, declared) {
                return Err(CodecError::UnknownSubtype {
                    declared: declared.clone(),
                    discriminator: actual.to_string(),
                });
            }
            Value::Entity(encode_document(doc)?)
        }
        (FieldType::List(inner), FieldValue::List(items)) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                encoded.push(encode_value(instance, field, inner, item)?.unwrap_or(Value::Null));
            }
            Value::Array(encoded)
        }
        (field_type, other) => return Err(CodecError::mismatch(field, field_type.type_name(), other.type_name())),
    };
    Ok(Some(encoded))
}

fn reference_key(instance: &Instance, field: &str, target: &str, reference: &Reference) -> CodecResult<Key> {
    if reference.document_type() != target {
        return Err(CodecError::WrongReferenceType {
            field: field.to_string(),
            expected: target.to_string(),
            found: reference.document_type().to_string(),
        });
    }
    let pk = reference
        .pk()
        .cloned()
        .ok_or_else(|| CodecError::UnsavedReference(target.to_string()))?;
    let kind = instance
        .schema(target)
        .and_then(|schema| schema.kind.clone())
        .ok_or_else(|| CodecError::UnknownDocumentType(target.to_string()))?;
    Ok(Key::new(kind, pk).map_err(StoreError::from)?)
}

/// Dictionary contents: scalars, lists and nested mappings only.
fn encode_plain(field: &str, value: &FieldValue) -> CodecResult<Value> {
    Ok(match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Float(x) => Value::Float(*x),
        FieldValue::String(s) => Value::Text(s.clone()),
        FieldValue::DateTime(dt) => Value::DateTime(*dt),
        FieldValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| encode_plain(field, item))
                .collect::<CodecResult<_>>()?,
        ),
        FieldValue::Dict(map) => Value::Entity(
            map.iter()
                .map(|(k, v)| Ok::<_, CodecError>((k.clone(), encode_plain(field, v)?)))
                .collect::<CodecResult<_>>()?,
        ),
        other => return Err(CodecError::mismatch(field, "a plain value", other.type_name())),
    })
}

/// Substitute `{field}` placeholders with the fields' current values.
fn render_template(template: &str, data: &BTreeMap<String, FieldValue>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                if let Some(value) = data.get(&after[..end]).filter(|v| !v.is_null()) {
                    out.push_str(&value.to_string());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

// ==================== Decoding ====================

/// Decode a payload into a document of `doc_type`.
///
/// Stored properties the schema does not know are ignored. A missing dict
/// field decodes to an empty dict.
pub fn decode_document(doc_type: &DocumentType, mut payload: Payload) -> CodecResult<Document> {
    let instance = doc_type.instance();
    let mut data = BTreeMap::new();

    for field in &doc_type.schema().fields {
        match payload.remove(field.stored_name()) {
            Some(value) => {
                let decoded = decode_value(instance, &field.name, &field.field_type, value)?;
                data.insert(field.name.clone(), decoded);
            }
            None if field.field_type == FieldType::Dict => {
                data.insert(field.name.clone(), FieldValue::Dict(BTreeMap::new()));
            }
            None => {}
        }
    }
    Ok(Document::from_data(doc_type.clone(), data))
}

/// Decode a payload declared as `declared`, dispatching on its `_cls`
/// discriminator when present.
pub fn decode_polymorphic(instance: &Instance, declared: &str, payload: Payload) -> CodecResult<Document> {
    let discriminator = payload
        .get(DISCRIMINATOR_ATTRIBUTE)
        .and_then(Value::as_str)
        .map(str::to_string);

    let schema = instance
        .resolve_subtype(declared, discriminator.as_deref())
        .ok_or_else(|| match &discriminator {
            Some(name) => CodecError::UnknownSubtype {
                declared: declared.to_string(),
                discriminator: name.clone(),
            },
            None => CodecError::UnknownDocumentType(declared.to_string()),
        })?;
    decode_document(&DocumentType::from_schema(instance.clone(), schema), payload)
}

/// Decode one stored value.
pub fn decode_value(instance: &Instance, field: &str, field_type: &FieldType, value: Value) -> CodecResult<FieldValue> {
    let decoded = match (field_type, value) {
        (FieldType::Dict, Value::Null) => FieldValue::Dict(BTreeMap::new()),
        (_, Value::Null) => FieldValue::Null,
        (FieldType::Boolean, Value::Bool(b)) => FieldValue::Bool(b),
        (FieldType::Integer | FieldType::Number | FieldType::Identifier, Value::Integer(i)) => FieldValue::Integer(i),
        (FieldType::Float, Value::Integer(i)) => FieldValue::Float(i as f64),
        (FieldType::Float | FieldType::Number, Value::Float(x)) => FieldValue::Float(x),
        (
            FieldType::String | FieldType::Url | FieldType::Email | FieldType::FormattedString(_) | FieldType::Identifier,
            Value::Text(s),
        ) => FieldValue::String(s),
        (FieldType::Identifier, Value::Key(key)) => key.id_or_name().cloned().map(FieldValue::from).unwrap_or_default(),
        (FieldType::DateTime, Value::DateTime(dt)) => FieldValue::DateTime(dt),
        (FieldType::DateTime, Value::Timestamp(ts)) => FieldValue::DateTime(ts.naive_utc()),
        (FieldType::Dict, Value::Entity(map)) => FieldValue::Dict(
            map.into_iter()
                .map(|(k, v)| (unescape_dict_key(&k), decode_plain(v)))
                .collect(),
        ),
        (FieldType::Bytes, Value::Blob(bytes)) => FieldValue::Opaque(
            rmp_serde::from_slice(&bytes).map_err(|e| CodecError::Serialization(e.to_string()))?,
        ),
        (FieldType::Reference(target), value @ (Value::Key(_) | Value::Integer(_) | Value::Text(_))) => {
            if let Value::Key(key) = &value {
                let expected = instance.schema(target).and_then(|schema| schema.kind.clone());
                if expected.as_ref().is_some_and(|kind| kind != key.kind()) {
                    return Err(CodecError::WrongReferenceType {
                        field: field.to_string(),
                        expected: target.clone(),
                        found: key.kind().to_string(),
                    });
                }
            }
            let pk = value
                .to_identifier()
                .ok_or_else(|| CodecError::mismatch(field, "a complete key", "incomplete key"))?;
            FieldValue::Reference(Reference::new(instance.clone(), target.clone(), Some(pk)))
        }
        (FieldType::Embedded(declared), Value::Entity(map)) => {
            FieldValue::Embedded(Box::new(decode_polymorphic(instance, declared, map)?))
        }
        (FieldType::List(inner), Value::Array(items)) => FieldValue::List(
            items
                .into_iter()
                .map(|item| decode_value(instance, field, inner, item))
                .collect::<CodecResult<_>>()?,
        ),
        (field_type, other) => return Err(CodecError::mismatch(field, field_type.type_name(), other.type_name())),
    };
    Ok(decoded)
}

fn decode_plain(value: Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(b),
        Value::Integer(i) => FieldValue::Integer(i),
        Value::Float(x) => FieldValue::Float(x),
        Value::Text(s) => FieldValue::String(s),
        Value::Blob(bytes) => FieldValue::Opaque(serde_json::Value::from(bytes)),
        Value::DateTime(dt) => FieldValue::DateTime(dt),
        Value::Timestamp(ts) => FieldValue::DateTime(ts.naive_utc()),
        Value::Key(key) => key.id_or_name().cloned().map(FieldValue::from).unwrap_or_default(),
        Value::Array(items) => FieldValue::List(items.into_iter().map(decode_plain).collect()),
        Value::Entity(map) => FieldValue::Dict(map.into_iter().map(|(k, v)| (k, decode_plain(v))).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::schema::{DocumentTemplate, FieldDef};
    use crate::store::{Identifier, Kind, MemoryStore};
    use chrono::NaiveDate;
    use serde_json::json;

    fn setup() -> Instance {
        let instance = Instance::new(Arc::new(MemoryStore::new()));
        instance
            .register(
                DocumentTemplate::embedded("Shape")
                    .add_required_field("sides", FieldType::Integer),
            )
            .unwrap();
        instance
            .register(
                DocumentTemplate::embedded("Square")
                    .child_of("Shape")
                    .add_field("length", FieldType::Float),
            )
            .unwrap();
        instance
            .register(
                DocumentTemplate::new("Drawing")
                    .add_field("meta", FieldType::Dict)
                    .add_field("blob", FieldType::Bytes)
                    .add_field("shape", FieldType::Embedded("Shape".into()))
                    .add_field("owner", FieldType::Reference("Drawing".into()))
                    .add_field("related", FieldType::List(Box::new(FieldType::Reference("Drawing".into()))))
                    .add_field("first", FieldType::String)
                    .add_field("last", FieldType::String)
                    .field(FieldDef::new("title", FieldType::FormattedString("{first} {last}".into())).attribute("t"))
                    .add_field("created", FieldType::DateTime),
            )
            .unwrap();
        instance
    }

    fn drawing(instance: &Instance) -> Document {
        instance.document_type("Drawing").unwrap().create()
    }

    #[test]
    fn test_dict_key_escaping() {
        assert_eq!(escape_dict_key("a.b.c"), "a\u{FF0E}b\u{FF0E}c");
        assert_eq!(unescape_dict_key(&escape_dict_key("a.b")), "a.b");
    }

    #[test]
    fn test_dict_escaped_one_level() {
        let instance = setup();
        let mut doc = drawing(&instance);
        doc.set(
            "meta",
            FieldValue::from_json(&json!({"a.b": 1, "nested": {"c.d": 2}})),
        )
        .unwrap();

        let payload = encode_document(&doc).unwrap();
        let Value::Entity(meta) = &payload["meta"] else {
            panic!("dict stored as {:?}", payload["meta"]);
        };
        assert!(meta.contains_key("a\u{FF0E}b"));
        let Value::Entity(nested) = &meta["nested"] else {
            panic!("nested dict stored as {:?}", meta["nested"]);
        };
        assert!(nested.contains_key("c.d"));

        let decoded = decode_document(doc.document_type(), payload).unwrap();
        assert_eq!(decoded.get("meta"), doc.get("meta"));
    }

    #[test]
    fn test_empty_dict_omitted() {
        let instance = setup();
        let mut doc = drawing(&instance);
        doc.set("meta", FieldValue::Dict(BTreeMap::new())).unwrap();

        let payload = encode_document(&doc).unwrap();
        assert!(!payload.contains_key("meta"));

        let decoded = decode_document(doc.document_type(), payload).unwrap();
        assert_eq!(decoded.get("meta"), Some(&FieldValue::Dict(BTreeMap::new())));
    }

    #[test]
    fn test_null_dict_reads_back_empty() {
        let instance = setup();
        let mut doc = drawing(&instance);
        doc.set("meta", FieldValue::Null).unwrap();

        let mut payload = encode_document(&doc).unwrap();
        assert!(!payload.contains_key("meta"));

        // rows written by other clients may hold an explicit null
        payload.insert("meta".to_string(), Value::Null);
        let decoded = decode_document(doc.document_type(), payload).unwrap();
        assert_eq!(decoded.get("meta"), Some(&FieldValue::Dict(BTreeMap::new())));
    }

    #[test]
    fn test_bytes_round_trip() {
        let instance = setup();
        let mut doc = drawing(&instance);
        let weights = json!({"layers": [0.5, 1.5], "name": "w", "depth": 3});
        doc.set("blob", FieldValue::Opaque(weights.clone())).unwrap();

        let payload = encode_document(&doc).unwrap();
        assert!(matches!(payload["blob"], Value::Blob(_)));

        let decoded = decode_document(doc.document_type(), payload).unwrap();
        assert_eq!(decoded.get("blob"), Some(&FieldValue::Opaque(weights)));
    }

    #[test]
    fn test_null_passes_through() {
        let instance = setup();
        let mut doc = drawing(&instance);
        doc.set("blob", FieldValue::Null).unwrap();

        let payload = encode_document(&doc).unwrap();
        assert_eq!(payload["blob"], Value::Null);
        let decoded = decode_document(doc.document_type(), payload).unwrap();
        assert_eq!(decoded.get("blob"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_reference_encoding() {
        let instance = setup();
        let mut doc = drawing(&instance);
        doc.set("owner", Reference::new(instance.clone(), "Drawing", Some(Identifier::Id(3))))
            .unwrap();

        let payload = encode_document(&doc).unwrap();
        let expected = Key::new(Kind::new("Drawing").unwrap(), Identifier::Id(3)).unwrap();
        assert_eq!(payload["owner"], Value::Key(expected.clone()));

        // keys come back as bare identifiers at the top level and as keys in lists
        let mut stored = payload.clone();
        stored.insert("owner".into(), Value::Integer(3));
        stored.insert("related".into(), Value::Array(vec![Value::Key(expected)]));
        let decoded = decode_document(doc.document_type(), stored).unwrap();

        let owner = decoded.get("owner").and_then(FieldValue::as_reference).unwrap();
        assert_eq!(owner.document_type(), "Drawing");
        assert_eq!(owner.pk(), Some(&Identifier::Id(3)));
        let related = decoded.get("related").and_then(FieldValue::as_list).unwrap();
        assert_eq!(related[0].as_reference().and_then(Reference::pk), Some(&Identifier::Id(3)));
    }

    #[test]
    fn test_unsaved_reference_rejected() {
        let instance = setup();
        let mut doc = drawing(&instance);
        let unsaved = drawing(&instance).to_reference();
        doc.set("related", vec![unsaved]).unwrap();

        assert!(matches!(
            encode_document(&doc),
            Err(CodecError::UnsavedReference(_))
        ));
    }

    #[test]
    fn test_reference_kind_checked_on_decode() {
        let instance = setup();
        let doc = drawing(&instance);
        let mut payload = Payload::new();
        payload.insert(
            "owner".into(),
            Value::Key(Key::new(Kind::new("Other").unwrap(), Identifier::Id(1)).unwrap()),
        );

        assert!(matches!(
            decode_document(doc.document_type(), payload),
            Err(CodecError::WrongReferenceType { .. })
        ));
    }

    #[test]
    fn test_embedded_subtype_round_trip() {
        let instance = setup();
        let mut square = instance.document_type("Square").unwrap().create();
        square.set("sides", 4).unwrap();
        square.set("length", 2.5).unwrap();

        let mut doc = drawing(&instance);
        doc.set("shape", square.clone()).unwrap();

        let payload = encode_document(&doc).unwrap();
        let Value::Entity(shape) = &payload["shape"] else {
            panic!("embedded stored as {:?}", payload["shape"]);
        };
        assert_eq!(shape[DISCRIMINATOR_ATTRIBUTE], Value::Text("Square".into()));
        assert!(!shape.contains_key("_id"));

        let decoded = decode_document(doc.document_type(), payload).unwrap();
        let embedded = decoded.get("shape").and_then(FieldValue::as_embedded).unwrap();
        assert_eq!(embedded.document_type().name(), "Square");
        assert_eq!(embedded, &square);
    }

    #[test]
    fn test_unknown_discriminator() {
        let instance = setup();
        let doc = drawing(&instance);
        let mut shape = Payload::new();
        shape.insert(DISCRIMINATOR_ATTRIBUTE.into(), Value::Text("Circle".into()));
        let mut payload = Payload::new();
        payload.insert("shape".into(), Value::Entity(shape));

        assert!(matches!(
            decode_document(doc.document_type(), payload),
            Err(CodecError::UnknownSubtype { .. })
        ));
    }

    #[test]
    fn test_formatted_string_and_datetime() {
        let instance = setup();
        let mut doc = drawing(&instance);
        doc.set("first", "Son").unwrap();
        doc.set("last", "Goku").unwrap();
        let when = NaiveDate::from_ymd_opt(1984, 11, 20).unwrap().and_hms_opt(8, 30, 0).unwrap();
        doc.set("created", when).unwrap();

        let mut payload = encode_document(&doc).unwrap();
        assert_eq!(payload["t"], Value::Text("Son Goku".into()));
        assert_eq!(payload["created"], Value::DateTime(when));

        // the store hands timestamps back with a timezone
        payload.insert("created".into(), Value::Timestamp(when.and_utc()));
        let decoded = decode_document(doc.document_type(), payload).unwrap();
        assert_eq!(decoded.get("created"), Some(&FieldValue::DateTime(when)));
        assert_eq!(decoded.get("title"), Some(&FieldValue::from("Son Goku")));
    }

    #[test]
    fn test_render_template() {
        let mut data = BTreeMap::new();
        data.insert("a".to_string(), FieldValue::Integer(1));
        assert_eq!(render_template("x{a}y{missing}z{", &data), "x1yz{");
    }

    #[test]
    fn test_type_mismatch_on_decode() {
        let instance = setup();
        let result = decode_value(&instance, "sides", &FieldType::Integer, Value::Text("four".into()));
        assert!(matches!(result, Err(CodecError::TypeMismatch { .. })));
    }
}
