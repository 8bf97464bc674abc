//! Resource identity and ordering.

use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity of a resource within a batch.
///
/// Rendered as `group/version/kind/namespace/name`. Keys compare as plain
/// strings, which gives the deterministic visit order used everywhere in
/// the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Computes the identity key of a resource.
pub fn resource_key(resource: &Resource) -> ResourceKey {
    let gvk = resource.gvk();
    ResourceKey(format!(
        "{}/{}/{}/{}/{}",
        gvk.group,
        gvk.version,
        gvk.kind,
        resource.namespace(),
        resource.name()
    ))
}

/// Sorts resources by identity key.
///
/// The sort is stable, so resources sharing a key keep their input order.
pub fn sort_resources(resources: &mut [Resource]) {
    resources.sort_by_cached_key(resource_key);
}
