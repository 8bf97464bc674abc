//! The versioned batch record.

use crate::gvk::GroupVersionKind;
use crate::naming::{batch_name, decode_batch_name};
use crate::resource::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Label carrying the base name on every batch record.
pub const BATCH_NAME_LABEL: &str = "name";

/// A record of one reconciliation attempt for a named batch.
///
/// The typed form mirrors the wire shape field for field, so conversion to
/// and from an untyped [`Resource`] is lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedBatch {
    /// API version of the record type.
    pub api_version: String,
    /// Kind of the record type.
    pub kind: String,
    /// Object metadata.
    pub metadata: BatchMeta,
    /// Resources that belong to this batch.
    #[serde(default)]
    pub spec: BatchSpec,
    /// Lifecycle state.
    #[serde(default)]
    pub status: BatchStatus,
}

impl VersionedBatch {
    /// Creates a pending record for `base` at `version`.
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        base: &str,
        version: u32,
        groups: Vec<BatchGroup>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(BATCH_NAME_LABEL.to_string(), base.to_string());
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata: BatchMeta {
                name: batch_name(base, version),
                labels,
                ..BatchMeta::default()
            },
            spec: BatchSpec { resources: groups },
            status: BatchStatus {
                phase: BatchPhase::Pending,
                started_at: Some(started_at),
            },
        }
    }

    /// Returns the synthesized record name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the store-assigned identifier, or `""` before creation.
    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    /// Decodes the record name into base name and version.
    pub fn decoded_name(&self) -> Option<(String, u32)> {
        decode_batch_name(&self.metadata.name)
    }

    /// Iterates over every resource reference with its type.
    pub fn refs(&self) -> impl Iterator<Item = (GroupVersionKind, &ResourceRef)> + '_ {
        self.spec.resources.iter().flat_map(|group| {
            let gvk = GroupVersionKind::new(&group.group, &group.version, &group.kind);
            group.items.iter().map(move |item| (gvk.clone(), item))
        })
    }
}

/// Metadata of a batch record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMeta {
    /// Record name, `<base>.v<version>`.
    pub name: String,
    /// Store-assigned identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Store-assigned concurrency token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    /// Labels; always contains [`BATCH_NAME_LABEL`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Desired content of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpec {
    /// Resource references grouped by type, ordered by `group/version/kind`.
    #[serde(default)]
    pub resources: Vec<BatchGroup>,
}

/// All references of one type within a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGroup {
    /// API group.
    #[serde(default)]
    pub group: String,
    /// API version.
    pub version: String,
    /// Kind.
    pub kind: String,
    /// References in resource key order.
    #[serde(default)]
    pub items: Vec<ResourceRef>,
}

/// A (namespace, name) reference within a [`BatchGroup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Namespace; empty for cluster-scoped resources.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Name.
    pub name: String,
}

/// Lifecycle phase of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchPhase {
    /// Resources are being applied.
    #[default]
    Pending,
}

/// Lifecycle state of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatus {
    /// Current phase.
    #[serde(default)]
    pub phase: BatchPhase,
    /// When the reconciliation started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Groups resources by type for a batch spec.
///
/// Items keep the order of `resources`, which callers sort by key first.
/// Groups are ordered by their `group/version/kind` string.
pub fn group_refs(resources: &[Resource]) -> Vec<BatchGroup> {
    let mut order: Vec<GroupVersionKind> = Vec::new();
    let mut items: HashMap<GroupVersionKind, Vec<ResourceRef>> = HashMap::new();

    for resource in resources {
        let gvk = resource.gvk();
        let entry = items.entry(gvk.clone()).or_insert_with(|| {
            order.push(gvk);
            Vec::new()
        });
        entry.push(ResourceRef {
            namespace: resource.namespace().to_string(),
            name: resource.name().to_string(),
        });
    }

    order.sort_by_cached_key(ToString::to_string);
    order
        .into_iter()
        .map(|gvk| {
            let refs = items.remove(&gvk).unwrap_or_default();
            BatchGroup {
                group: gvk.group,
                version: gvk.version,
                kind: gvk.kind,
                items: refs,
            }
        })
        .collect()
}
