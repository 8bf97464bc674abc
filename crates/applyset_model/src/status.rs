//! Per-resource reconciliation status.

use crate::key::ResourceKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The action taken (or attempted) for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResourceAction {
    /// Nothing was done.
    #[default]
    None,
    /// The resource was created.
    Create,
    /// The existing object was updated in place.
    Update,
    /// The existing object was deleted and created again.
    Replace,
}

impl fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceAction::None => "none",
            ResourceAction::Create => "create",
            ResourceAction::Update => "update",
            ResourceAction::Replace => "replace",
        };
        f.write_str(s)
    }
}

/// Outcome of the latest attempt on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Identity key of the resource.
    pub key: ResourceKey,
    /// Namespace of the resource.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Name of the resource.
    pub name: String,
    /// Action taken by the latest attempt.
    pub action: ResourceAction,
    /// Error of the latest attempt, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceStatus {
    /// Creates a status with no action and no error.
    pub fn pending(key: ResourceKey, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key,
            namespace: namespace.into(),
            name: name.into(),
            action: ResourceAction::None,
            error: None,
        }
    }

    /// Returns true if the latest attempt failed.
    pub fn is_failed(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Records the result of an attempt.
    pub fn record(&mut self, action: ResourceAction, error: Option<String>) {
        self.action = action;
        self.error = error.filter(|e| !e.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_attempts() {
        let mut status = ResourceStatus::pending("/v1/ConfigMap/default/a".into(), "default", "a");
        assert_eq!(status.action, ResourceAction::None);
        assert!(!status.is_failed());

        status.record(ResourceAction::Update, Some("update resource: conflict".into()));
        assert!(status.is_failed());

        status.record(ResourceAction::Replace, None);
        assert!(!status.is_failed());
        assert_eq!(status.action, ResourceAction::Replace);

        status.record(ResourceAction::Create, Some(String::new()));
        assert!(!status.is_failed());
    }

    #[test]
    fn action_display() {
        assert_eq!(ResourceAction::None.to_string(), "none");
        assert_eq!(ResourceAction::Replace.to_string(), "replace");
    }
}
