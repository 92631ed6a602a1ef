use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod entity;

pub use entity::{
    group_by_company, Certificate, CollectionKind, Education, Experience, Skill, POSITION_COLUMN,
};

/// Identifier assigned by the remote row store.
///
/// Opaque to the store: it is only ever compared and echoed back to the gateway.
pub type RowId = i64;

/// Partial field bag used for inserts and updates.
pub type Fields = HashMap<String, Value>;

/// Dynamically typed field value.
///
/// Mirrors the JSON values a row store accepts, so that a `Fields` patch can be
/// sent to any gateway without knowing the concrete entity type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
    Null,
}

impl Value {
    /// Create a Value from a serde_json::Value
    pub fn from_json_value(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    n.as_f64().map(Value::Float).unwrap_or(Value::Null)
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from_json_value).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from_json_value(v)))
                    .collect(),
            ),
        }
    }

    /// Get string value, returning None if not a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json_value(v)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => serde_json::Value::String(s),
            Value::Integer(i) => serde_json::Value::Number(serde_json::Number::from(i)),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(b),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(Into::into).collect())
            }
            Value::Object(obj) => {
                serde_json::Value::Object(obj.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Null => serde_json::Value::Null,
        }
    }
}

/// Convert a field bag into a JSON object.
pub fn fields_to_json(fields: Fields) -> serde_json::Value {
    serde_json::Value::Object(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
}

/// Build a field bag from `(name, value)` pairs.
///
/// ```
/// use folio_api::{fields, Value};
///
/// let f = fields([("name", Value::from("Rust"))]);
/// assert_eq!(f["name"], Value::from("Rust"));
/// ```
pub fn fields<K, I>(pairs: I) -> Fields
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Error taxonomy for collection operations.
///
/// Every failure is a value. The store turns these into a rollback plus a
/// `last_error` message; nothing is retried automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("{operation} failed: {message}")]
    Backend { operation: String, message: String },

    #[error("{operation} on {collection} rejected: a conflicting operation is still pending")]
    ConcurrentReorderRejected {
        collection: CollectionKind,
        operation: String,
    },

    #[error("{collection} row {id} not found")]
    NotFound { collection: CollectionKind, id: RowId },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("{operation} timed out")]
    Timeout { operation: String },
}

impl ApiError {
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidOperation {
            message: message.into(),
        }
    }
}
