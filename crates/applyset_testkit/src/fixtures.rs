//! Manifest fixtures.
//!
//! Each helper builds a minimal valid manifest of one type. Fixtures
//! panic on malformed input, which only happens with a bug in the fixture.

use applyset_model::{GroupVersionResource, Resource};
use serde_json::{json, Value};

fn manifest(value: Value) -> Resource {
    Resource::from_value(value).expect("fixture is a JSON object")
}

/// A config map holding `data`.
pub fn config_map_with(namespace: &str, name: &str, data: Value) -> Resource {
    manifest(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": name, "namespace": namespace},
        "data": data
    }))
}

/// A config map with a single placeholder entry.
pub fn config_map(namespace: &str, name: &str) -> Resource {
    config_map_with(namespace, name, json!({"key": "value"}))
}

/// A cluster IP service exposing one port.
pub fn service(namespace: &str, name: &str, port: u16) -> Resource {
    manifest(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {
            "selector": {"app": name},
            "ports": [{"port": port}]
        }
    }))
}

/// A namespace.
pub fn namespace(name: &str) -> Resource {
    manifest(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {"name": name}
    }))
}

/// A namespaced schema extension defining `kind` under `group/version`.
///
/// The plural is the lowercased kind with an `s` appended.
pub fn custom_resource_definition(group: &str, version: &str, kind: &str) -> Resource {
    let plural = format!("{}s", kind.to_lowercase());
    manifest(json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {"name": format!("{plural}.{group}")},
        "spec": {
            "group": group,
            "scope": "Namespaced",
            "names": {"plural": plural, "kind": kind},
            "versions": [{"name": version, "served": true, "storage": true}]
        }
    }))
}

/// An instance of a type defined by [`custom_resource_definition`].
pub fn custom_resource(
    group: &str,
    version: &str,
    kind: &str,
    namespace: &str,
    name: &str,
) -> Resource {
    manifest(json!({
        "apiVersion": format!("{group}/{version}"),
        "kind": kind,
        "metadata": {"name": name, "namespace": namespace},
        "spec": {}
    }))
}

/// Storage path of config maps.
pub fn config_maps() -> GroupVersionResource {
    GroupVersionResource::new("", "v1", "configmaps")
}

/// Storage path of `apiextensions.k8s.io/v1` schema extensions.
pub fn custom_resource_definitions() -> GroupVersionResource {
    GroupVersionResource::new("apiextensions.k8s.io", "v1", "customresourcedefinitions")
}
