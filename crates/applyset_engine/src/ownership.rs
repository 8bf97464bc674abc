//! Linking resources to the batch that applies them.

use crate::config::BatchType;
use crate::error::{ReconcileError, ReconcileResult};
use applyset_model::{decode_batch_name, resource_key, OwnerReference, Resource, VersionedBatch};
use tracing::warn;

/// Makes `batch` the single batch owner of `resource`.
///
/// Existing batch owner references must belong to the same base name and
/// must not be newer than `batch`; they are replaced. Owner references of
/// other kinds are kept as they are.
pub fn link_owner(
    batch: &VersionedBatch,
    batch_type: &BatchType,
    resource: &mut Resource,
) -> ReconcileResult<()> {
    let (base, version) = batch
        .decoded_name()
        .ok_or_else(|| ReconcileError::InvalidBatchName(batch.name().to_string()))?;
    let api_version = batch_type.api_version();

    let existing = resource
        .owner_references()
        .map_err(|e| ReconcileError::malformed(resource_key(resource).to_string(), e))?;

    let mut owners = Vec::with_capacity(existing.len() + 1);
    for owner in existing {
        if !owner.is_kind(&api_version, &batch_type.kind) {
            owners.push(owner);
            continue;
        }
        let (owner_base, owner_version) = decode_batch_name(&owner.name)
            .ok_or_else(|| ReconcileError::InvalidBatchName(owner.name.clone()))?;
        if owner_base != base {
            warn!(resource = %resource_key(resource), owner = %owner.name, "conflicting batch owner");
            return Err(ReconcileError::ConflictingOwner {
                resource: resource_key(resource).to_string(),
                owner: owner.name,
            });
        }
        if owner_version > version {
            warn!(resource = %resource_key(resource), owner = %owner.name, version, "resource owned by newer batch");
            return Err(ReconcileError::OwnerVersionRegression {
                resource: resource_key(resource).to_string(),
                owner: owner.name,
                version,
            });
        }
    }

    owners.push(
        OwnerReference::new(api_version, batch_type.kind.clone(), batch.name(), batch.uid())
            .blocking_deletion(),
    );
    resource
        .set_owner_references(&owners)
        .map_err(|e| ReconcileError::malformed(resource_key(resource).to_string(), e))
}
