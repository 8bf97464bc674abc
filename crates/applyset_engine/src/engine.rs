//! The reconciliation engine.

use crate::apply::{apply_one, Attempt};
use crate::cluster::{Discovery, ObjectStore, TypeResolver};
use crate::config::{ApplyOptions, EngineConfig};
use crate::error::{ApplyError, ReconcileError};
use crate::ownership::link_owner;
use crate::schema::{wait_for_schemas, PendingSchema};
use crate::version::{create_batch, next_version};
use applyset_model::{
    is_schema_extension, is_valid_base_name, resource_key, sort_resources, Resource, ResourceKey,
    ResourceStatus, VersionedBatch,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a reconciliation that ran to completion.
///
/// Individual resources may still have failed; see
/// [`failures`](ApplyReport::failures).
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// The batch record created for this reconciliation.
    pub batch: VersionedBatch,
    /// The input resources in key order, as last sent to the store.
    pub resources: Vec<Resource>,
    /// Status of each resource, aligned with `resources`.
    pub statuses: Vec<ResourceStatus>,
    /// Number of apply passes run over regular resources.
    pub passes: u32,
    /// Wall time of the reconciliation.
    pub duration: Duration,
}

impl ApplyReport {
    /// Returns the statuses of resources whose latest attempt failed.
    pub fn failures(&self) -> Vec<&ResourceStatus> {
        self.statuses.iter().filter(|s| s.is_failed()).collect()
    }

    /// Returns true if every resource was applied.
    pub fn is_clean(&self) -> bool {
        self.statuses.iter().all(|s| !s.is_failed())
    }

    /// Returns the status of the resource with the given key.
    pub fn status_of(&self, key: &ResourceKey) -> Option<&ResourceStatus> {
        self.statuses.iter().find(|s| &s.key == key)
    }
}

/// Applies batches of resources to a cluster.
///
/// The reconciler owns no per-call state; everything a call records is
/// returned in its [`ApplyReport`] or [`ApplyError`]. Calls for different
/// base names may run concurrently. Calls for the same base name must be
/// serialized by the caller, since version numbers are computed with a
/// read followed by a write.
///
/// # Example
///
/// ```rust
/// use applyset_engine::{ApplyOptions, EngineConfig, MemoryCluster, Reconciler};
/// use applyset_model::Resource;
/// use std::sync::Arc;
///
/// let cluster = Arc::new(MemoryCluster::new());
/// let reconciler = Reconciler::new(
///     EngineConfig::default(),
///     cluster.clone(),
///     cluster.clone(),
///     cluster,
/// );
///
/// let mut cm = Resource::new("v1", "ConfigMap");
/// cm.set_namespace("default");
/// cm.set_name("settings");
///
/// let report = reconciler.apply("app", &ApplyOptions::new(), vec![cm]).unwrap();
/// assert_eq!(report.batch.name(), "app.v1");
/// assert!(report.is_clean());
/// ```
pub struct Reconciler<S: ?Sized, R: ?Sized, D: ?Sized> {
    config: EngineConfig,
    store: Arc<S>,
    resolver: Arc<R>,
    discovery: Arc<D>,
}

impl<S, R, D> Reconciler<S, R, D>
where
    S: ObjectStore + ?Sized,
    R: TypeResolver + ?Sized,
    D: Discovery + ?Sized,
{
    /// Creates a reconciler over the given collaborators.
    pub fn new(config: EngineConfig, store: Arc<S>, resolver: Arc<R>, discovery: Arc<D>) -> Self {
        Self {
            config,
            store,
            resolver,
            discovery,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reconciles `resources` as the next version of batch `base`.
    ///
    /// Empty manifests are dropped and the rest are ordered by key. A new
    /// batch record is created and every regular resource is linked to it.
    /// Schema extensions are then installed and the call waits until they
    /// are served. Finally regular resources are applied in passes: the
    /// first pass attempts all of them, later passes retry only failures,
    /// and the loop stops once no failures remain or their count stops
    /// changing.
    ///
    /// Per-resource failures are reported in the statuses and do not fail
    /// the call. The call fails if the batch cannot be set up, if a
    /// resource is owned by another batch, if schema extensions are not
    /// served in time, or if `options` cancels it.
    pub fn apply(
        &self,
        base: &str,
        options: &ApplyOptions,
        resources: Vec<Resource>,
    ) -> Result<ApplyReport, ApplyError> {
        let start = Instant::now();
        if !is_valid_base_name(base) {
            return Err(ApplyError::new(
                None,
                Vec::new(),
                ReconcileError::InvalidBatchName(base.to_string()),
            ));
        }

        let mut resources: Vec<Resource> =
            resources.into_iter().filter(|r| !r.is_empty()).collect();
        sort_resources(&mut resources);
        let mut statuses: Vec<ResourceStatus> = resources
            .iter()
            .map(|r| ResourceStatus::pending(resource_key(r), r.namespace(), r.name()))
            .collect();

        let batch_type = &self.config.batch_type;
        let batch = match options.check().and_then(|()| {
            let version = next_version(self.store.as_ref(), batch_type, base)?;
            create_batch(self.store.as_ref(), batch_type, base, version, &resources)
        }) {
            Ok(batch) => batch,
            Err(e) => return Err(ApplyError::new(None, statuses, e)),
        };
        info!(batch = batch.name(), resources = resources.len(), "created batch");

        let (schemas, regular): (Vec<usize>, Vec<usize>) =
            (0..resources.len()).partition(|&i| is_schema_extension(&resources[i]));

        for &i in &regular {
            if let Err(e) = link_owner(&batch, batch_type, &mut resources[i]) {
                return Err(ApplyError::new(Some(batch), statuses, e));
            }
        }

        if let Err(e) = self.install_schemas(&schemas, &mut resources, &mut statuses, options) {
            return Err(ApplyError::new(Some(batch), statuses, e));
        }

        let passes = match self.converge(&batch, &regular, &mut resources, &mut statuses, options) {
            Ok(passes) => passes,
            Err(e) => return Err(ApplyError::new(Some(batch), statuses, e)),
        };

        let report = ApplyReport {
            batch,
            resources,
            statuses,
            passes,
            duration: start.elapsed(),
        };
        info!(
            batch = report.batch.name(),
            passes,
            failures = report.failures().len(),
            elapsed_ms = report.duration.as_millis() as u64,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Installs schema extensions without replacement, then waits for them.
    fn install_schemas(
        &self,
        schemas: &[usize],
        resources: &mut [Resource],
        statuses: &mut [ResourceStatus],
        options: &ApplyOptions,
    ) -> Result<(), ReconcileError> {
        if schemas.is_empty() {
            return Ok(());
        }

        let pending = schemas
            .iter()
            .map(|&i| PendingSchema::from_resource(&resources[i]))
            .collect::<Result<Vec<_>, _>>()?;

        options.check()?;
        for &i in schemas {
            let attempt = apply_one(
                self.store.as_ref(),
                self.resolver.as_ref(),
                &mut resources[i],
                false,
            );
            record(&mut statuses[i], attempt);
        }

        wait_for_schemas(self.discovery.as_ref(), &pending, &self.config, options)
    }

    /// Runs apply passes over regular resources. Returns the number of passes.
    fn converge(
        &self,
        batch: &VersionedBatch,
        regular: &[usize],
        resources: &mut [Resource],
        statuses: &mut [ResourceStatus],
        options: &ApplyOptions,
    ) -> Result<u32, ReconcileError> {
        let mut previous = None;
        let mut passes = 0;

        while passes < self.config.max_passes {
            options.check()?;
            let first = passes == 0;
            for &i in regular {
                if !first && !statuses[i].is_failed() {
                    continue;
                }
                let attempt = apply_one(
                    self.store.as_ref(),
                    self.resolver.as_ref(),
                    &mut resources[i],
                    true,
                );
                record(&mut statuses[i], attempt);
            }
            passes += 1;

            let failures = regular.iter().filter(|&&i| statuses[i].is_failed()).count();
            info!(batch = batch.name(), pass = passes, failures, "apply pass finished");
            if failures == 0 || previous == Some(failures) {
                break;
            }
            previous = Some(failures);
        }

        Ok(passes)
    }
}

fn record(status: &mut ResourceStatus, attempt: Attempt) {
    match &attempt.error {
        None => debug!(resource = %status.key, action = %attempt.action, "applied resource"),
        Some(e) => {
            warn!(resource = %status.key, action = %attempt.action, error = %e, "apply failed")
        }
    }
    status.record(attempt.action, attempt.error.map(|e| e.to_string()));
}
