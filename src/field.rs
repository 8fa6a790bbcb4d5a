//! Field types and the typed value bridge
//!
//! [`FieldValue`] converts a record's field into a storage [`Value`] and back.
//! The storage to record direction applies best-effort coercion, since the
//! same field comes back from a document store as a native value and from a
//! relational engine as a column value (booleans as integers, lists and maps
//! as JSON text).

use crate::value::{Document, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Blob,
    List,
    Map,
    /// Dynamically typed value, stored as JSON text in relational engines
    Any,
    /// Embedded record
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Blob => "blob",
            FieldType::List => "list",
            FieldType::Map => "map",
            FieldType::Any => "any",
            FieldType::Object => "object",
        }
    }

    /// Whether a string-encoded default can be coerced into this type
    pub fn accepts_string_default(&self) -> bool {
        matches!(
            self,
            FieldType::Text | FieldType::Integer | FieldType::Float | FieldType::Boolean
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw bytes stored in a BLOB column
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

/// A Rust type that can live in a persisted field.
///
/// `from_value` hands back the rejected value on failure so the caller can
/// report what it found.
pub trait FieldValue: Sized + Send + Sync + 'static {
    const FIELD_TYPE: FieldType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, Value>;
}

impl FieldValue for String {
    const FIELD_TYPE: FieldType = FieldType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FieldValue for i64 {
    const FIELD_TYPE: FieldType = FieldType::Integer;

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Int(i) => Ok(i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
            Value::Text(ref s) => s.trim().parse().map_err(|_| value),
            other => Err(other),
        }
    }
}

impl FieldValue for i32 {
    const FIELD_TYPE: FieldType = FieldType::Integer;

    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        let original = value.clone();
        i64::from_value(value).and_then(|i| i32::try_from(i).map_err(|_| original))
    }
}

impl FieldValue for u32 {
    const FIELD_TYPE: FieldType = FieldType::Integer;

    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        let original = value.clone();
        i64::from_value(value).and_then(|i| u32::try_from(i).map_err(|_| original))
    }
}

impl FieldValue for f64 {
    const FIELD_TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::Text(ref s) => s.trim().parse().map_err(|_| value),
            other => Err(other),
        }
    }
}

impl FieldValue for f32 {
    const FIELD_TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FieldValue for bool {
    const FIELD_TYPE: FieldType = FieldType::Boolean;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(i) => Ok(i != 0),
            Value::Text(ref s) => match s.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(value),
            },
            other => Err(other),
        }
    }
}

impl FieldValue for Blob {
    const FIELD_TYPE: FieldType = FieldType::Blob;

    fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Bytes(b) => Ok(Blob(b)),
            other => Err(other),
        }
    }
}

/// Decode JSON text stored in a relational column
fn decode_json_text(value: Value) -> Value {
    match value {
        Value::Text(ref s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(json) => Value::from_json(json),
            Err(_) => value,
        },
        other => other,
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    const FIELD_TYPE: FieldType = FieldType::List;

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match decode_json_text(value) {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(other),
        }
    }
}

impl FieldValue for Document {
    const FIELD_TYPE: FieldType = FieldType::Map;

    fn to_value(&self) -> Value {
        Value::Map(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match decode_json_text(value) {
            Value::Map(doc) => Ok(doc),
            other => Err(other),
        }
    }
}

impl FieldValue for Value {
    const FIELD_TYPE: FieldType = FieldType::Any;

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
