//! Field types, validators and field definitions.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::value::FieldValue;

/// Stored name of the primary-key field.
pub const PRIMARY_KEY_ATTRIBUTE: &str = "_id";

/// Stored name of the subtype discriminator of child documents.
pub const DISCRIMINATOR_ATTRIBUTE: &str = "_cls";

/// Field types a document template can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    DateTime,
    String,
    /// Integer or float.
    Number,
    Integer,
    Float,
    Url,
    Email,
    /// String computed from other fields, e.g. `"{first} {last}"`.
    FormattedString(String),
    /// Mapping with string keys and plain values.
    Dict,
    /// Opaque value stored as a serialized blob.
    Bytes,
    /// Reference to a document of the named type.
    Reference(String),
    /// Embedded document of the named type (or one of its subtypes).
    Embedded(String),
    List(Box<FieldType>),
    /// Primary key: an integer id or a string name.
    Identifier,
    // Declarable, but the entity store has no representation for them.
    ObjectId,
    Decimal,
    Uuid,
    GenericReference,
}

impl FieldType {
    /// Check if values of this type can be persisted. Lists are checked
    /// through their element type.
    pub fn is_supported(&self) -> bool {
        match self {
            FieldType::List(inner) => inner.is_supported(),
            FieldType::ObjectId | FieldType::Decimal | FieldType::Uuid | FieldType::GenericReference => false,
            _ => true,
        }
    }

    /// The innermost unsupported type, for error reporting.
    pub fn unsupported_part(&self) -> Option<&FieldType> {
        match self {
            FieldType::List(inner) => inner.unsupported_part(),
            other if !other.is_supported() => Some(other),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            FieldType::Boolean => "BooleanField".into(),
            FieldType::DateTime => "DateTimeField".into(),
            FieldType::String => "StringField".into(),
            FieldType::Number => "NumberField".into(),
            FieldType::Integer => "IntegerField".into(),
            FieldType::Float => "FloatField".into(),
            FieldType::Url => "UrlField".into(),
            FieldType::Email => "EmailField".into(),
            FieldType::FormattedString(_) => "FormattedStringField".into(),
            FieldType::Dict => "DictField".into(),
            FieldType::Bytes => "BytesField".into(),
            FieldType::Reference(target) => format!("ReferenceField({})", target),
            FieldType::Embedded(target) => format!("EmbeddedField({})", target),
            FieldType::List(inner) => format!("ListField({})", inner.type_name()),
            FieldType::Identifier => "IdentifierField".into(),
            FieldType::ObjectId => "ObjectIdField".into(),
            FieldType::Decimal => "DecimalField".into(),
            FieldType::Uuid => "UUIDField".into(),
            FieldType::GenericReference => "GenericReferenceField".into(),
        }
    }

    /// Structural check of an in-memory value against this type.
    ///
    /// Null is always accepted; whether a field may be null is the
    /// `required` flag's business.
    pub fn check(&self, value: &FieldValue) -> Result<(), String> {
        let ok = match (self, value) {
            (_, FieldValue::Null) => true,
            (FieldType::Boolean, FieldValue::Bool(_)) => true,
            (FieldType::DateTime, FieldValue::DateTime(_)) => true,
            (FieldType::String | FieldType::FormattedString(_), FieldValue::String(_)) => true,
            (FieldType::Number | FieldType::Float, FieldValue::Integer(_) | FieldValue::Float(_)) => true,
            (FieldType::Integer, FieldValue::Integer(_)) => true,
            (FieldType::Identifier, FieldValue::Integer(i)) => *i != 0,
            (FieldType::Identifier, FieldValue::String(s)) => !s.is_empty(),
            (FieldType::Url, FieldValue::String(s)) => {
                if !is_url(s) {
                    return Err(format!("'{}' is not a valid URL", s));
                }
                true
            }
            (FieldType::Email, FieldValue::String(s)) => {
                if !is_email(s) {
                    return Err(format!("'{}' is not a valid email address", s));
                }
                true
            }
            (FieldType::Dict, FieldValue::Dict(map)) => map.values().all(FieldValue::is_plain),
            (FieldType::Bytes, FieldValue::Opaque(_)) => true,
            (FieldType::Reference(target), FieldValue::Reference(r)) => {
                if r.document_type() != target.as_str() {
                    return Err(format!("`{}` reference expected, got `{}`", target, r.document_type()));
                }
                true
            }
            (FieldType::Embedded(_), FieldValue::Embedded(_)) => true,
            (FieldType::List(inner), FieldValue::List(items)) => {
                for item in items {
                    inner.check(item)?;
                }
                true
            }
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(format!("expected {}, got {}", self.type_name(), value.type_name()))
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn is_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("http://")
        .or_else(|| s.strip_prefix("https://"))
        .or_else(|| s.strip_prefix("ftp://"));
    match rest {
        Some(rest) => {
            let host = rest.split(|c: char| c == '/' || c == '?' || c == '#').next().unwrap_or("");
            !host.is_empty() && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Signature of custom validator closures.
pub type ValidatorFn = dyn Fn(&FieldValue) -> Result<(), String> + Send + Sync;

/// A validation rule attached to a field when the template is built.
///
/// Validators never change after registration; a field's chain is fixed by
/// its definition.
#[derive(Clone)]
pub enum Validator {
    /// Inclusive bounds on numbers, datetimes or strings.
    Range {
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    },
    /// Bounds on the length of strings, lists and dicts.
    Length { min: Option<usize>, max: Option<usize> },
    /// Value must equal one of the choices.
    OneOf(Vec<FieldValue>),
    Custom(Arc<ValidatorFn>),
}

impl Validator {
    pub fn range(min: Option<impl Into<FieldValue>>, max: Option<impl Into<FieldValue>>) -> Self {
        Validator::Range {
            min: min.map(Into::into),
            max: max.map(Into::into),
        }
    }

    pub fn min(min: impl Into<FieldValue>) -> Self {
        Validator::Range {
            min: Some(min.into()),
            max: None,
        }
    }

    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Validator::Length { min, max }
    }

    pub fn one_of<V: Into<FieldValue>>(choices: impl IntoIterator<Item = V>) -> Self {
        Validator::OneOf(choices.into_iter().map(Into::into).collect())
    }

    pub fn custom(f: impl Fn(&FieldValue) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Validator::Custom(Arc::new(f))
    }

    /// Run the rule. Null values pass every rule.
    pub fn validate(&self, value: &FieldValue) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Validator::Range { min, max } => {
                if let Some(min) = min {
                    match value.partial_compare(min) {
                        Some(Ordering::Less) => return Err(format!("must be greater than or equal to {}", min)),
                        None => return Err(format!("cannot compare {} with {}", value.type_name(), min.type_name())),
                        _ => {}
                    }
                }
                if let Some(max) = max {
                    match value.partial_compare(max) {
                        Some(Ordering::Greater) => return Err(format!("must be less than or equal to {}", max)),
                        None => return Err(format!("cannot compare {} with {}", value.type_name(), max.type_name())),
                        _ => {}
                    }
                }
                Ok(())
            }
            Validator::Length { min, max } => {
                let len = value
                    .len()
                    .ok_or_else(|| format!("{} has no length", value.type_name()))?;
                if min.is_some_and(|min| len < min) || max.is_some_and(|max| len > max) {
                    return Err(format!("length {} outside of [{:?}, {:?}]", len, min, max));
                }
                Ok(())
            }
            Validator::OneOf(choices) => {
                if choices.contains(value) {
                    Ok(())
                } else {
                    Err(format!("{} is not one of the allowed choices", value))
                }
            }
            Validator::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Range { min, max } => f.debug_struct("Range").field("min", min).field("max", max).finish(),
            Validator::Length { min, max } => f.debug_struct("Length").field("min", min).field("max", max).finish(),
            Validator::OneOf(choices) => f.debug_tuple("OneOf").field(choices).finish(),
            Validator::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Field definition: name, type, flags and validator chains.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name as seen on the document.
    pub name: String,
    pub field_type: FieldType,
    /// Field must be set before commit.
    pub required: bool,
    /// Name the field is stored under, when it differs from `name`.
    pub attribute: Option<String>,
    /// Value given to new documents.
    pub default: Option<FieldValue>,
    /// Run whenever the field is set.
    pub validators: Vec<Validator>,
    /// Run at commit time.
    pub io_validators: Vec<Validator>,
    pub description: Option<String>,
}

impl FieldDef {
    /// Create a new field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            attribute: None,
            default: None,
            validators: Vec::new(),
            io_validators: Vec::new(),
            description: None,
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Store the field under another name.
    pub fn attribute(mut self, stored_name: impl Into<String>) -> Self {
        self.attribute = Some(stored_name.into());
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Add a validator run on every assignment.
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Add a validator run at commit time.
    pub fn io_validate(mut self, validator: Validator) -> Self {
        self.io_validators.push(validator);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Name of the field in stored payloads.
    pub fn stored_name(&self) -> &str {
        self.attribute.as_deref().unwrap_or(&self.name)
    }

    pub fn is_primary_key(&self) -> bool {
        self.stored_name() == PRIMARY_KEY_ATTRIBUTE
    }

    /// Type check plus the validator chain.
    pub fn check(&self, value: &FieldValue) -> Result<(), String> {
        self.field_type
            .check(value)
            .map_err(|e| format!("field '{}': {}", self.name, e))?;
        for validator in &self.validators {
            validator
                .validate(value)
                .map_err(|e| format!("field '{}': {}", self.name, e))?;
        }
        Ok(())
    }
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.field_type)?;
        if let Some(attribute) = &self.attribute {
            write!(f, " AS {}", attribute)?;
        }
        if self.required {
            write!(f, " REQUIRED")?;
        }
        Ok(())
    }
}
