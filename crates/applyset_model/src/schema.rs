//! Schema-extension resources.
//!
//! A schema extension defines a new resource type that the cluster starts
//! serving once the extension is installed.

use crate::convert::from_wire;
use crate::error::{ModelError, ModelResult};
use crate::gvk::GroupVersion;
use crate::resource::Resource;
use serde::Deserialize;

/// API group of schema-extension resources.
pub const SCHEMA_GROUP: &str = "apiextensions.k8s.io";

/// Kind of schema-extension resources.
pub const SCHEMA_KIND: &str = "CustomResourceDefinition";

const SCHEMA_VERSIONS: [&str; 2] = ["v1beta1", "v1"];

/// Returns true if the resource defines a new resource type.
pub fn is_schema_extension(resource: &Resource) -> bool {
    let gv = GroupVersion::parse(resource.api_version());
    gv.group == SCHEMA_GROUP
        && SCHEMA_VERSIONS.contains(&gv.version.as_str())
        && resource.kind() == SCHEMA_KIND
}

/// The parts of a schema-extension manifest needed to detect availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    /// Group of the defined type.
    pub group: String,
    /// Served version of the defined type.
    pub version: String,
    /// Plural resource name of the defined type.
    pub plural: String,
    /// Kind of the defined type, if declared.
    pub kind: String,
}

impl SchemaDefinition {
    /// Reads the definition from a schema-extension manifest.
    ///
    /// The version is `spec.version` when set, otherwise the first served
    /// entry of `spec.versions`.
    pub fn from_resource(resource: &Resource) -> ModelResult<Self> {
        let manifest: Manifest = from_wire(resource)?;
        let spec = manifest.spec;

        if spec.group.is_empty() {
            return Err(ModelError::MissingField("spec.group".into()));
        }
        if spec.names.plural.is_empty() {
            return Err(ModelError::MissingField("spec.names.plural".into()));
        }
        let version = spec
            .version
            .filter(|v| !v.is_empty())
            .or_else(|| {
                spec.versions
                    .into_iter()
                    .find(|v| v.served)
                    .map(|v| v.name)
            })
            .ok_or_else(|| ModelError::MissingField("spec.version".into()))?;

        Ok(Self {
            group: spec.group,
            version,
            plural: spec.names.plural,
            kind: spec.names.kind,
        })
    }

    /// Returns the group/version the defined type is served under.
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group.clone(), self.version.clone())
    }
}

#[derive(Deserialize)]
struct Manifest {
    spec: Spec,
}

#[derive(Deserialize)]
struct Spec {
    #[serde(default)]
    group: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    versions: Vec<Version>,
    #[serde(default)]
    names: Names,
}

#[derive(Deserialize)]
struct Version {
    name: String,
    #[serde(default = "served_by_default")]
    served: bool,
}

#[derive(Default, Deserialize)]
struct Names {
    #[serde(default)]
    plural: String,
    #[serde(default)]
    kind: String,
}

fn served_by_default() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_schema_extensions() {
        let crd = Resource::new("apiextensions.k8s.io/v1beta1", "CustomResourceDefinition");
        assert!(is_schema_extension(&crd));
        let crd = Resource::new("apiextensions.k8s.io/v1", "CustomResourceDefinition");
        assert!(is_schema_extension(&crd));

        assert!(!is_schema_extension(&Resource::new("v1", "ConfigMap")));
        assert!(!is_schema_extension(&Resource::new(
            "apiextensions.k8s.io/v2",
            "CustomResourceDefinition"
        )));
        assert!(!is_schema_extension(&Resource::new(
            "example.com/v1beta1",
            "CustomResourceDefinition"
        )));
    }

    #[test]
    fn reads_single_version_schema() {
        let crd = Resource::from_value(json!({
            "apiVersion": "apiextensions.k8s.io/v1beta1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": "robots.example.com"},
            "spec": {
                "group": "example.com",
                "version": "v1alpha1",
                "names": {"plural": "robots", "kind": "Robot"}
            }
        }))
        .unwrap();
        let def = SchemaDefinition::from_resource(&crd).unwrap();
        assert_eq!(def.group_version(), GroupVersion::new("example.com", "v1alpha1"));
        assert_eq!(def.plural, "robots");
        assert_eq!(def.kind, "Robot");
    }

    #[test]
    fn falls_back_to_first_served_version() {
        let crd = Resource::from_value(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": "robots.example.com"},
            "spec": {
                "group": "example.com",
                "versions": [
                    {"name": "v1alpha1", "served": false},
                    {"name": "v1beta1", "served": true}
                ],
                "names": {"plural": "robots"}
            }
        }))
        .unwrap();
        let def = SchemaDefinition::from_resource(&crd).unwrap();
        assert_eq!(def.version, "v1beta1");
    }

    #[test]
    fn missing_fields_are_reported() {
        let crd = Resource::from_value(json!({
            "apiVersion": "apiextensions.k8s.io/v1beta1",
            "kind": "CustomResourceDefinition",
            "spec": {"group": "example.com", "version": "v1"}
        }))
        .unwrap();
        assert!(matches!(
            SchemaDefinition::from_resource(&crd),
            Err(ModelError::MissingField(f)) if f == "spec.names.plural"
        ));

        let crd = Resource::new("apiextensions.k8s.io/v1beta1", "CustomResourceDefinition");
        assert!(SchemaDefinition::from_resource(&crd).is_err());
    }
}
