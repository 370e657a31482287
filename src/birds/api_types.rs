//! Response shapes of the bird backend that differ from the domain types.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::error::DataError;

/// `{"count": n}` body of the count endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiCount {
  pub count: usize,
}

/// Decode a JSON value into `T`, mapping failures to `DataError::Decode`.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, DataError> {
  serde_json::from_value(value).map_err(|e| DataError::Decode(e.to_string()))
}

/// List endpoints answer either with a bare array or with `{"root": [...]}`.
/// Any other shape is read as an empty list.
pub fn unwrap_root<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, DataError> {
  match value {
    Value::Array(_) => decode(value),
    Value::Object(mut map) => match map.remove("root") {
      Some(root @ Value::Array(_)) => decode(root),
      _ => Ok(Vec::new()),
    },
    _ => Ok(Vec::new()),
  }
}
