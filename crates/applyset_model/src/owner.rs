//! Owner references.

use serde::{Deserialize, Serialize};

/// A back-reference from a resource to the object that owns it.
///
/// Serialized in the cluster wire shape (`apiVersion`, `kind`, `name`,
/// `uid`, `controller`, `blockOwnerDeletion`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    /// API version of the owner.
    pub api_version: String,
    /// Kind of the owner.
    pub kind: String,
    /// Name of the owner.
    pub name: String,
    /// Store-assigned identifier of the owner.
    #[serde(default)]
    pub uid: String,
    /// Whether the owner is the managing controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    /// Whether the owner cannot be deleted before this object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

impl OwnerReference {
    /// Creates an owner reference with no flags set.
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            uid: uid.into(),
            controller: None,
            block_owner_deletion: None,
        }
    }

    /// Sets the block-owner-deletion flag.
    pub fn blocking_deletion(mut self) -> Self {
        self.block_owner_deletion = Some(true);
        self
    }

    /// Returns true if this reference points at the given owner type.
    pub fn is_kind(&self, api_version: &str, kind: &str) -> bool {
        self.api_version == api_version && self.kind == kind
    }
}
