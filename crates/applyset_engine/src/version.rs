//! Batch versioning.
//!
//! Every reconciliation creates a new batch record named `<base>.v<n>`,
//! where `n` is one more than the highest existing version for `<base>`.
//! The computation is a read followed by a write with no lock in between,
//! so concurrent reconciliations of one base name must be serialized by
//! the caller.

use crate::cluster::ObjectStore;
use crate::config::BatchType;
use crate::error::{ReconcileError, ReconcileResult};
use applyset_model::{decode_batch_name, from_wire, group_refs, to_wire, Resource, VersionedBatch};
use chrono::Utc;
use tracing::debug;

/// Returns the next version number for `base`.
///
/// Records whose names do not decode as batch names are ignored.
pub fn next_version<S: ObjectStore + ?Sized>(
    store: &S,
    batch_type: &BatchType,
    base: &str,
) -> ReconcileResult<u32> {
    let records = store
        .list(&batch_type.resource(), None)
        .map_err(ReconcileError::List)?;

    let current = records
        .iter()
        .filter_map(|record| decode_batch_name(record.name()))
        .filter(|(name, _)| name == base)
        .map(|(_, version)| version)
        .max()
        .unwrap_or(0);

    debug!(base, current, scanned = records.len(), "computed batch version");

    current
        .checked_add(1)
        .ok_or_else(|| ReconcileError::malformed("batch version", "version space exhausted"))
}

/// Creates the batch record for `base` at `version`.
///
/// `resources` must already be in key order; the record lists them grouped
/// by type. The returned record is read back from the store, so it carries
/// the store-assigned identifier.
pub fn create_batch<S: ObjectStore + ?Sized>(
    store: &S,
    batch_type: &BatchType,
    base: &str,
    version: u32,
    resources: &[Resource],
) -> ReconcileResult<VersionedBatch> {
    let batch = VersionedBatch::new(
        batch_type.api_version(),
        batch_type.kind.clone(),
        base,
        version,
        group_refs(resources),
        Utc::now(),
    );
    let wire = to_wire(&batch).map_err(|e| ReconcileError::malformed("batch record", e))?;

    let created = store
        .create(&batch_type.resource(), None, &wire)
        .map_err(|source| ReconcileError::BatchCreate {
            name: batch.name().to_string(),
            source,
        })?;

    from_wire(&created).map_err(|e| ReconcileError::malformed("batch record", e))
}
