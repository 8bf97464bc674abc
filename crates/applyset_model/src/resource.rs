//! Untyped resource manifests.

use crate::error::{ModelError, ModelResult};
use crate::gvk::GroupVersionKind;
use crate::owner::OwnerReference;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// An untyped resource manifest.
///
/// A `Resource` is a JSON object in the cluster wire shape (`apiVersion`,
/// `kind`, `metadata`, ...). Accessors read well-known metadata fields and
/// return empty values when a field is absent or has the wrong type, so
/// partially written manifests can still be keyed and ordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    fields: Map<String, Value>,
}

impl Resource {
    /// Creates a manifest with only `apiVersion` and `kind` set.
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("apiVersion".into(), Value::String(api_version.into()));
        fields.insert("kind".into(), Value::String(kind.into()));
        Self { fields }
    }

    /// Wraps a JSON value, which must be an object.
    pub fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ModelError::NotAnObject {
                found: json_type(&other),
            }),
        }
    }

    /// Unwraps into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Returns the underlying JSON object.
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns true if the manifest has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the `apiVersion` field.
    pub fn api_version(&self) -> &str {
        self.str_at(&["apiVersion"])
    }

    /// Returns the `kind` field.
    pub fn kind(&self) -> &str {
        self.str_at(&["kind"])
    }

    /// Returns the type descriptor derived from `apiVersion` and `kind`.
    pub fn gvk(&self) -> GroupVersionKind {
        crate::gvk::GroupVersion::parse(self.api_version()).with_kind(self.kind())
    }

    /// Returns `metadata.name`, or `""` when unset.
    pub fn name(&self) -> &str {
        self.str_at(&["metadata", "name"])
    }

    /// Sets `metadata.name`.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = Value::String(name.into());
        self.with_metadata(|meta| meta.insert("name".into(), name));
    }

    /// Returns `metadata.namespace`, or `""` for cluster-scoped manifests.
    pub fn namespace(&self) -> &str {
        self.str_at(&["metadata", "namespace"])
    }

    /// Sets `metadata.namespace`.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = Value::String(namespace.into());
        self.with_metadata(|meta| meta.insert("namespace".into(), namespace));
    }

    /// Returns the optimistic-concurrency token, if any.
    pub fn resource_version(&self) -> Option<&str> {
        Some(self.str_at(&["metadata", "resourceVersion"])).filter(|v| !v.is_empty())
    }

    /// Sets or clears the optimistic-concurrency token.
    pub fn set_resource_version(&mut self, version: Option<&str>) {
        match version.filter(|v| !v.is_empty()) {
            Some(v) => {
                let version = Value::String(v.into());
                self.with_metadata(|meta| meta.insert("resourceVersion".into(), version));
            }
            None => {
                if let Some(Value::Object(meta)) = self.fields.get_mut("metadata") {
                    meta.remove("resourceVersion");
                }
            }
        }
    }

    /// Returns the store-assigned identifier, if any.
    pub fn uid(&self) -> Option<&str> {
        Some(self.str_at(&["metadata", "uid"])).filter(|v| !v.is_empty())
    }

    /// Sets the store-assigned identifier.
    pub fn set_uid(&mut self, uid: impl Into<String>) {
        let uid = Value::String(uid.into());
        self.with_metadata(|meta| meta.insert("uid".into(), uid));
    }

    /// Returns string-valued labels.
    pub fn labels(&self) -> BTreeMap<String, String> {
        match self.field(&["metadata", "labels"]) {
            Some(Value::Object(labels)) => labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    /// Sets one label, creating the label map if needed.
    pub fn set_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), Value::String(value.into()));
        self.with_metadata(|meta| {
            let mut labels = match meta.remove("labels") {
                Some(Value::Object(labels)) => labels,
                _ => Map::new(),
            };
            labels.insert(key, value);
            meta.insert("labels".into(), Value::Object(labels));
        });
    }

    /// Reads `metadata.ownerReferences`.
    pub fn owner_references(&self) -> ModelResult<Vec<OwnerReference>> {
        match self.field(&["metadata", "ownerReferences"]) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ModelError::invalid_field("metadata.ownerReferences", e.to_string())
            }),
        }
    }

    /// Replaces `metadata.ownerReferences`; an empty slice removes the field.
    pub fn set_owner_references(&mut self, refs: &[OwnerReference]) -> ModelResult<()> {
        if refs.is_empty() {
            if let Some(Value::Object(meta)) = self.fields.get_mut("metadata") {
                meta.remove("ownerReferences");
            }
            return Ok(());
        }
        let value = serde_json::to_value(refs)?;
        self.with_metadata(|meta| meta.insert("ownerReferences".into(), value));
        Ok(())
    }

    /// Looks up a nested field by path.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.fields.get(*first)?;
        for segment in rest {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }

    fn str_at(&self, path: &[&str]) -> &str {
        self.field(path).and_then(Value::as_str).unwrap_or("")
    }

    /// Runs `f` on the metadata object. A missing or non-object
    /// `metadata` is replaced with an empty object first.
    fn with_metadata<R>(&mut self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut meta = match self.fields.remove("metadata") {
            Some(Value::Object(meta)) => meta,
            _ => Map::new(),
        };
        let out = f(&mut meta);
        self.fields.insert("metadata".into(), Value::Object(meta));
        out
    }
}

impl TryFrom<Value> for Resource {
    type Error = ModelError;

    fn try_from(value: Value) -> ModelResult<Self> {
        Self::from_value(value)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_map() -> Resource {
        Resource::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "settings", "namespace": "prod"},
            "data": {"mode": "fast"}
        }))
        .unwrap()
    }

    #[test]
    fn metadata_accessors() {
        let r = config_map();
        assert_eq!(r.api_version(), "v1");
        assert_eq!(r.kind(), "ConfigMap");
        assert_eq!(r.name(), "settings");
        assert_eq!(r.namespace(), "prod");
        assert_eq!(r.gvk(), GroupVersionKind::new("", "v1", "ConfigMap"));
        assert!(r.resource_version().is_none());
        assert!(!r.is_empty());
        assert!(Resource::default().is_empty());
    }

    #[test]
    fn rejects_non_objects() {
        let err = Resource::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ModelError::NotAnObject { found: "array" }));
    }

    #[test]
    fn resource_version_set_and_clear() {
        let mut r = config_map();
        r.set_resource_version(Some("42"));
        assert_eq!(r.resource_version(), Some("42"));
        r.set_resource_version(None);
        assert!(r.resource_version().is_none());
        assert!(r.field(&["metadata", "resourceVersion"]).is_none());
        r.set_resource_version(Some(""));
        assert!(r.resource_version().is_none());
    }

    #[test]
    fn metadata_created_on_demand() {
        let mut r = Resource::new("v1", "Namespace");
        assert_eq!(r.name(), "");
        r.set_name("team-a");
        r.set_label("owner", "infra");
        assert_eq!(r.name(), "team-a");
        assert_eq!(r.labels().get("owner").map(String::as_str), Some("infra"));
    }

    #[test]
    fn malformed_metadata_is_replaced_on_write() {
        let mut r = Resource::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": "broken"
        }))
        .unwrap();
        r.set_namespace("prod");
        r.set_name("settings");
        assert_eq!(r.namespace(), "prod");
        assert_eq!(r.name(), "settings");

        let mut r = Resource::from_value(json!({
            "kind": "ConfigMap",
            "metadata": {"name": "x", "labels": ["a"]}
        }))
        .unwrap();
        r.set_label("tier", "web");
        assert_eq!(r.name(), "x");
        assert_eq!(
            r.field(&["metadata", "labels"]),
            Some(&json!({"tier": "web"}))
        );
    }

    #[test]
    fn owner_references_round_trip() {
        let mut r = config_map();
        assert!(r.owner_references().unwrap().is_empty());

        let owner = OwnerReference::new("apps/v1", "ReplicaSet", "web-1", "uid-1");
        r.set_owner_references(std::slice::from_ref(&owner)).unwrap();
        assert_eq!(r.owner_references().unwrap(), vec![owner]);

        r.set_owner_references(&[]).unwrap();
        assert!(r.field(&["metadata", "ownerReferences"]).is_none());
    }

    #[test]
    fn malformed_owner_references() {
        let r = Resource::from_value(json!({
            "metadata": {"name": "x", "ownerReferences": "nope"}
        }))
        .unwrap();
        assert!(matches!(
            r.owner_references(),
            Err(ModelError::InvalidField { .. })
        ));
    }
}
