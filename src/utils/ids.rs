// src/utils/ids.rs

use serde::{Deserialize, Deserializer, de::Error};
use serde_json::Value;

/// Deserializes a record identifier that the store may return either as a
/// string (UUID keys) or as a number (identity keys).
pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected an id, got {other}"))),
    }
}

/// Renders any JSON scalar id as a string, used where rows are handled untyped.
pub fn id_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
