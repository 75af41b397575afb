//! Entity boundary: payloads in, entities out, and back.
//!
//! A payload is the flat mapping the document layer produces, keyed by
//! stored field name, with the primary key under [`PRIMARY_KEY`].

use std::collections::BTreeMap;

use super::error::{CodecError, CodecResult};
use crate::store::{Entity, EntityStore, Kind, Value};

/// Payload field carrying the primary key.
pub const PRIMARY_KEY: &str = "_id";

/// Field-name to value mapping exchanged with the collection layer.
pub type Payload = BTreeMap<String, Value>;

/// Build an entity from `payload`.
///
/// The primary-key field is popped: a key value is reused as-is, an integer
/// or string becomes the identifier of a key in `kind`, and an absent or null
/// value yields an incomplete key so the store allocates one.
pub fn pack(store: &dyn EntityStore, kind: &Kind, mut payload: Payload) -> CodecResult<Entity> {
    let key = match payload.remove(PRIMARY_KEY) {
        None | Some(Value::Null) => store.key(kind, None)?,
        Some(Value::Key(key)) => key,
        Some(other) => {
            let identifier = other
                .to_identifier()
                .ok_or(CodecError::InvalidPrimaryKey(other.type_name()))?;
            store.key(kind, Some(identifier))?
        }
    };
    Ok(Entity::with_properties(key, payload))
}

/// Turn a stored entity back into a payload; absent stays absent.
pub fn unpack(entity: Option<Entity>) -> Option<Payload> {
    entity.map(unpack_entity)
}

/// Turn a stored entity into a payload.
///
/// The key is emitted as its bare identifier. Top-level key values become
/// identifiers too (a field may physically be a key). Timestamps lose their
/// timezone at any depth so round-tripped values compare equal to freshly
/// built ones.
pub fn unpack_entity(entity: Entity) -> Payload {
    let mut payload = Payload::new();
    let identifier = entity.key.id_or_name().cloned();
    payload.insert(
        PRIMARY_KEY.to_string(),
        identifier.map(Value::from).unwrap_or(Value::Null),
    );

    for (name, value) in entity.properties {
        let value = match value {
            Value::Key(key) => key.id_or_name().cloned().map(Value::from).unwrap_or(Value::Null),
            other => strip_timezone(other),
        };
        payload.insert(name, value);
    }
    payload
}

fn strip_timezone(value: Value) -> Value {
    match value {
        Value::Timestamp(ts) => Value::DateTime(ts.naive_utc()),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_timezone).collect()),
        Value::Entity(map) => Value::Entity(
            map.into_iter()
                .map(|(k, v)| (k, strip_timezone(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Identifier, Key, MemoryStore};
    use chrono::NaiveDate;

    fn setup() -> (MemoryStore, Kind) {
        (MemoryStore::new(), Kind::new("User").unwrap())
    }

    fn payload(fields: &[(&str, Value)]) -> Payload {
        fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_pack_without_primary_key() {
        let (store, kind) = setup();
        let entity = pack(&store, &kind, payload(&[("a", Value::Integer(5))])).unwrap();

        assert!(!entity.key.is_complete());
        assert_eq!(entity.get("a"), Some(&Value::Integer(5)));
        assert!(!entity.contains(PRIMARY_KEY));
    }

    #[test]
    fn test_pack_with_identifier() {
        let (store, kind) = setup();
        let entity = pack(
            &store,
            &kind,
            payload(&[(PRIMARY_KEY, Value::Integer(5)), ("a", Value::Integer(1))]),
        )
        .unwrap();
        assert_eq!(entity.key, Key::new(kind.clone(), Identifier::Id(5)).unwrap());

        let named = pack(&store, &kind, payload(&[(PRIMARY_KEY, Value::Text("goku".into()))])).unwrap();
        assert_eq!(named.key.id_or_name(), Some(&Identifier::from("goku")));
    }

    #[test]
    fn test_pack_reuses_key_verbatim() {
        let (store, kind) = setup();
        let other = Key::new(Kind::new("Model").unwrap(), Identifier::Id(3)).unwrap();
        let entity = pack(&store, &kind, payload(&[(PRIMARY_KEY, Value::Key(other.clone()))])).unwrap();
        assert_eq!(entity.key, other);
    }

    #[test]
    fn test_pack_rejects_bad_primary_key() {
        let (store, kind) = setup();
        let result = pack(&store, &kind, payload(&[(PRIMARY_KEY, Value::Float(1.5))]));
        assert!(matches!(result, Err(CodecError::InvalidPrimaryKey("float"))));

        let result = pack(&store, &kind, payload(&[(PRIMARY_KEY, Value::Integer(0))]));
        assert!(matches!(result, Err(CodecError::Store(_))));
    }

    #[test]
    fn test_unpack_absent() {
        assert_eq!(unpack(None), None);
    }

    #[test]
    fn test_unpack_translates_keys_and_timestamps() {
        let kind = Kind::new("User").unwrap();
        let naive = NaiveDate::from_ymd_opt(1984, 11, 20)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let friend = Key::new(kind.clone(), Identifier::from("vegeta")).unwrap();

        let mut entity = Entity::new(Key::new(kind, Identifier::Id(7)).unwrap());
        entity.set("birthday", Value::Timestamp(naive.and_utc()));
        entity.set("friend", Value::Key(friend));
        entity.set(
            "history",
            Value::Array(vec![Value::Timestamp(naive.and_utc())]),
        );

        let payload = unpack(Some(entity)).unwrap();
        assert_eq!(payload[PRIMARY_KEY], Value::Integer(7));
        assert_eq!(payload["birthday"], Value::DateTime(naive));
        assert_eq!(payload["friend"], Value::Text("vegeta".into()));
        assert_eq!(payload["history"], Value::Array(vec![Value::DateTime(naive)]));
    }
}
