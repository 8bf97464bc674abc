//! Schema-extension availability gate.
//!
//! Installing a schema extension only registers a new type; the cluster
//! serves it some time later. Instances of the new type cannot be applied
//! before that, so the engine waits here until discovery lists every
//! installed type.

use crate::cluster::{Discovery, DiscoveryError};
use crate::config::{ApplyOptions, EngineConfig};
use crate::error::{ReconcileError, ReconcileResult};
use applyset_model::{resource_key, Resource, ResourceKey, SchemaDefinition};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A schema extension waiting to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSchema {
    /// Identity key of the schema-extension resource.
    pub key: ResourceKey,
    /// The type it defines.
    pub definition: SchemaDefinition,
}

impl PendingSchema {
    /// Reads the defined type from a schema-extension manifest.
    pub fn from_resource(resource: &Resource) -> ReconcileResult<Self> {
        let key = resource_key(resource);
        let definition = SchemaDefinition::from_resource(resource)
            .map_err(|e| ReconcileError::malformed(key.to_string(), e))?;
        Ok(Self { key, definition })
    }
}

/// Returns true if discovery currently serves the type defined by `schema`.
///
/// The discovery cache is invalidated first. Discovery errors count as
/// "not served yet".
pub fn is_served<D: Discovery + ?Sized>(discovery: &D, schema: &SchemaDefinition) -> bool {
    discovery.invalidate();
    match discovery.resources_for(&schema.group_version()) {
        Ok(resources) => resources.iter().any(|r| r.name == schema.plural),
        Err(DiscoveryError::NotFound(gv)) => {
            debug!(group_version = %gv, "group version not served yet");
            false
        }
        Err(e) => {
            warn!(group_version = %schema.group_version(), error = %e, "discovery failed");
            false
        }
    }
}

/// Blocks until every schema in `schemas` is served.
///
/// Checks immediately, then once per poll interval. All schemas are checked
/// on every tick and the gate opens only when all of them are served in the
/// same tick. Fails with `SchemaAvailabilityTimeout` listing the keys still
/// missing once the configured timeout has passed, and with `Cancelled` when
/// `options` says so.
pub fn wait_for_schemas<D: Discovery + ?Sized>(
    discovery: &D,
    schemas: &[PendingSchema],
    config: &EngineConfig,
    options: &ApplyOptions,
) -> ReconcileResult<()> {
    if schemas.is_empty() {
        return Ok(());
    }

    let start = Instant::now();
    let mut ticks = 0u32;
    loop {
        options.check()?;
        ticks += 1;

        let pending: Vec<&PendingSchema> = schemas
            .iter()
            .filter(|s| !is_served(discovery, &s.definition))
            .collect();
        if pending.is_empty() {
            info!(schemas = schemas.len(), ticks, "schema extensions available");
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= config.schema_timeout {
            let pending: Vec<String> = pending.iter().map(|s| s.key.to_string()).collect();
            warn!(pending = ?pending, "timed out waiting for schema extensions");
            return Err(ReconcileError::SchemaAvailabilityTimeout {
                timeout: config.schema_timeout,
                pending,
            });
        }

        debug!(pending = pending.len(), ticks, "waiting for schema extensions");
        let remaining = config.schema_timeout - elapsed;
        options.pause(config.schema_poll_interval.min(remaining))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::cluster::StoreError;
    use crate::memory::{Fault, MemoryCluster, Operation};
    use applyset_model::GroupVersionResource;
    use serde_json::json;
    use std::thread;
    use std::time::Duration;

    fn crds() -> GroupVersionResource {
        GroupVersionResource::new("apiextensions.k8s.io", "v1", "customresourcedefinitions")
    }

    fn crd(plural: &str) -> Resource {
        Resource::from_value(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": format!("{plural}.example.com")},
            "spec": {
                "group": "example.com",
                "scope": "Namespaced",
                "versions": [{"name": "v1", "served": true}],
                "names": {"plural": plural, "kind": "Thing"}
            }
        }))
        .unwrap()
    }

    fn fast() -> EngineConfig {
        EngineConfig::new()
            .with_schema_poll_interval(Duration::from_millis(5))
            .with_schema_timeout(Duration::from_millis(100))
    }

    #[test]
    fn pending_schema_rejects_malformed_manifest() {
        let bad = Resource::new("apiextensions.k8s.io/v1", "CustomResourceDefinition");
        let err = PendingSchema::from_resource(&bad).unwrap_err();
        assert!(matches!(err, ReconcileError::Malformed { .. }));
    }

    #[test]
    fn served_schema_opens_gate_immediately() {
        let cluster = MemoryCluster::new();
        let robots = crd("robots");
        cluster.insert(&crds(), robots.clone()).unwrap();

        let schemas = vec![PendingSchema::from_resource(&robots).unwrap()];
        wait_for_schemas(&cluster, &schemas, &fast(), &ApplyOptions::new()).unwrap();
        assert_eq!(cluster.count(Operation::Discover), 1);
        assert_eq!(cluster.invalidations(), 1);
    }

    #[test]
    fn unserved_schema_times_out_with_pending_keys() {
        let cluster = MemoryCluster::new();
        cluster.set_serve_schemas(false);
        let robots = crd("robots");
        cluster.insert(&crds(), robots.clone()).unwrap();

        let schemas = vec![PendingSchema::from_resource(&robots).unwrap()];
        let err = wait_for_schemas(&cluster, &schemas, &fast(), &ApplyOptions::new()).unwrap_err();
        match err {
            ReconcileError::SchemaAvailabilityTimeout { timeout, pending } => {
                assert_eq!(timeout, Duration::from_millis(100));
                assert_eq!(pending, vec![schemas[0].key.to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cluster.count(Operation::Discover) > 1);
    }

    #[test]
    fn every_schema_is_rechecked_each_tick() {
        let cluster = MemoryCluster::new();
        cluster.set_serve_schemas(false);
        let robots = crd("robots");
        let drones = crd("drones");
        cluster.insert(&crds(), robots.clone()).unwrap();
        cluster.insert(&crds(), drones.clone()).unwrap();

        let schemas = vec![
            PendingSchema::from_resource(&drones).unwrap(),
            PendingSchema::from_resource(&robots).unwrap(),
        ];
        let config = fast().with_schema_timeout(Duration::ZERO);
        let err = wait_for_schemas(&cluster, &schemas, &config, &ApplyOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::SchemaAvailabilityTimeout { ref pending, .. } if pending.len() == 2
        ));
        assert_eq!(cluster.count(Operation::Discover), 2);
        assert_eq!(cluster.invalidations(), 2);
    }

    #[test]
    fn discovery_errors_mean_not_served() {
        let cluster = MemoryCluster::new();
        let robots = crd("robots");
        cluster.insert(&crds(), robots.clone()).unwrap();
        cluster.inject(
            Fault::new(Operation::Discover, StoreError::Unavailable("503".into())).times(2),
        );

        let schemas = vec![PendingSchema::from_resource(&robots).unwrap()];
        wait_for_schemas(&cluster, &schemas, &fast(), &ApplyOptions::new()).unwrap();
        assert_eq!(cluster.count(Operation::Discover), 3);
    }

    #[test]
    fn schema_served_later() {
        let cluster = std::sync::Arc::new(MemoryCluster::new());
        cluster.set_serve_schemas(false);
        let robots = crd("robots");
        cluster.insert(&crds(), robots.clone()).unwrap();

        let server = cluster.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            server.set_serve_schemas(true);
        });

        let schemas = vec![PendingSchema::from_resource(&robots).unwrap()];
        let config = fast().with_schema_timeout(Duration::from_secs(10));
        wait_for_schemas(cluster.as_ref(), &schemas, &config, &ApplyOptions::new()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn cancellation_interrupts_wait() {
        let cluster = MemoryCluster::new();
        cluster.set_serve_schemas(false);
        let robots = crd("robots");
        cluster.insert(&crds(), robots.clone()).unwrap();

        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        let schemas = vec![PendingSchema::from_resource(&robots).unwrap()];
        let config = EngineConfig::new().with_schema_timeout(Duration::from_secs(60));
        let options = ApplyOptions::new().with_cancel_token(token);
        let start = Instant::now();
        let err = wait_for_schemas(&cluster, &schemas, &config, &options).unwrap_err();
        assert_eq!(err, ReconcileError::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(60));
        handle.join().unwrap();
    }
}
