//! Conversion between typed records and untyped resources.
//!
//! Both directions go through `serde_json::Value`, so any type whose serde
//! shape matches the wire shape converts losslessly.

use crate::error::ModelResult;
use crate::resource::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts a typed record into an untyped resource.
pub fn to_wire<T: Serialize>(typed: &T) -> ModelResult<Resource> {
    Resource::from_value(serde_json::to_value(typed)?)
}

/// Converts an untyped resource into a typed record.
pub fn from_wire<T: DeserializeOwned>(resource: &Resource) -> ModelResult<T> {
    let value = serde_json::Value::Object(resource.as_object().clone());
    Ok(serde_json::from_value(value)?)
}
