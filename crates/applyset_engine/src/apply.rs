//! Applying a single resource.

use crate::cluster::{ObjectStore, TypeResolver};
use crate::error::ReconcileError;
use applyset_model::{Resource, ResourceAction};
use tracing::debug;

/// Outcome of one apply attempt.
///
/// `action` is the action that was taken or attempted; it is meaningful
/// even when `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// Action taken or attempted.
    pub action: ResourceAction,
    /// Error that ended the attempt, if any.
    pub error: Option<ReconcileError>,
}

impl Attempt {
    fn done(action: ResourceAction) -> Self {
        Self {
            action,
            error: None,
        }
    }

    fn failed(action: ResourceAction, error: ReconcileError) -> Self {
        Self {
            action,
            error: Some(error),
        }
    }

    /// Returns true if the attempt succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Creates, updates or replaces one resource in the store.
///
/// The resource is created if it does not exist, and updated otherwise.
/// When the update is rejected and `replace` is set, the stored object is
/// deleted and the resource created again.
///
/// `resource` is modified in place: it receives the stored object's
/// concurrency token before the update, and the token is cleared again
/// before re-creation. Callers observe whichever token was last set.
pub fn apply_one<S, R>(store: &S, resolver: &R, resource: &mut Resource, replace: bool) -> Attempt
where
    S: ObjectStore + ?Sized,
    R: TypeResolver + ?Sized,
{
    if resource.name().is_empty() {
        return Attempt::failed(ResourceAction::None, ReconcileError::MissingName);
    }

    let gvk = resource.gvk();
    let mapping = match resolver.resolve(&gvk) {
        Ok(mapping) => mapping,
        Err(source) => {
            return Attempt::failed(
                ResourceAction::None,
                ReconcileError::Mapping {
                    gvk: gvk.to_string(),
                    source,
                },
            )
        }
    };
    let namespace = mapping.namespace_of(resource).map(str::to_owned);
    let namespace = namespace.as_deref();
    let name = resource.name().to_owned();

    let existing = match store.get(&mapping.resource, namespace, &name) {
        Ok(existing) => existing,
        Err(e) if e.is_not_found() => {
            return match store.create(&mapping.resource, namespace, resource) {
                Ok(_) => Attempt::done(ResourceAction::Create),
                Err(e) => Attempt::failed(ResourceAction::Create, ReconcileError::Create(e)),
            };
        }
        Err(e) => return Attempt::failed(ResourceAction::None, ReconcileError::Get(e)),
    };

    resource.set_resource_version(existing.resource_version());
    match store.update(&mapping.resource, namespace, resource) {
        Ok(_) => return Attempt::done(ResourceAction::Update),
        Err(e) if !replace => {
            return Attempt::failed(ResourceAction::Update, ReconcileError::Update(e))
        }
        Err(e) => {
            debug!(resource = %mapping.resource, name = %name, error = %e, "update rejected, replacing");
        }
    }

    // The store may reject an update for reasons that a fresh create does
    // not hit (immutable fields), and it does not say which, so replace.
    if let Err(e) = store.delete(&mapping.resource, namespace, existing.name()) {
        return Attempt::failed(ResourceAction::Replace, ReconcileError::Delete(e));
    }
    resource.set_resource_version(None);
    match store.create(&mapping.resource, namespace, resource) {
        Ok(_) => Attempt::done(ResourceAction::Replace),
        Err(e) => Attempt::failed(ResourceAction::Replace, ReconcileError::Create(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ResolveError, StoreError};
    use crate::memory::{Fault, MemoryCluster, Operation};
    use applyset_model::GroupVersionResource;
    use serde_json::json;

    fn configmaps() -> GroupVersionResource {
        GroupVersionResource::new("", "v1", "configmaps")
    }

    fn config_map(name: &str, value: &str) -> Resource {
        Resource::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "default"},
            "data": {"value": value}
        }))
        .unwrap()
    }

    #[test]
    fn missing_name() {
        let cluster = MemoryCluster::new();
        let mut r = config_map("", "x");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert_eq!(attempt.action, ResourceAction::None);
        assert_eq!(attempt.error, Some(ReconcileError::MissingName));
        assert_eq!(cluster.calls().len(), 0);
    }

    #[test]
    fn unknown_type() {
        let cluster = MemoryCluster::new();
        let mut r = Resource::new("example.com/v1", "Robot");
        r.set_name("r1");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert_eq!(attempt.action, ResourceAction::None);
        assert!(matches!(
            attempt.error,
            Some(ReconcileError::Mapping {
                source: ResolveError::NoMapping(_),
                ..
            })
        ));
    }

    #[test]
    fn creates_missing_object() {
        let cluster = MemoryCluster::new();
        let mut r = config_map("a", "1");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert!(attempt.is_ok());
        assert_eq!(attempt.action, ResourceAction::Create);
        assert!(cluster.object(&configmaps(), Some("default"), "a").is_some());
    }

    #[test]
    fn updates_existing_object_with_token() {
        let cluster = MemoryCluster::new();
        let stored = cluster.insert(&configmaps(), config_map("a", "1")).unwrap();

        let mut r = config_map("a", "2");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert!(attempt.is_ok());
        assert_eq!(attempt.action, ResourceAction::Update);
        // The caller's copy carries the token used for the update.
        assert_eq!(r.resource_version(), stored.resource_version());

        let now = cluster.object(&configmaps(), Some("default"), "a").unwrap();
        assert_eq!(now.field(&["data", "value"]), Some(&json!("2")));
        assert_eq!(now.uid(), stored.uid());
    }

    #[test]
    fn get_failure() {
        let cluster = MemoryCluster::new();
        cluster.inject(Fault::new(Operation::Get, StoreError::Unavailable("timeout".into())));
        let mut r = config_map("a", "1");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert_eq!(attempt.action, ResourceAction::None);
        assert!(matches!(attempt.error, Some(ReconcileError::Get(_))));
    }

    #[test]
    fn create_failure_reports_create() {
        let cluster = MemoryCluster::new();
        cluster.inject(Fault::new(Operation::Create, StoreError::Invalid("bad data".into())));
        let mut r = config_map("a", "1");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert_eq!(attempt.action, ResourceAction::Create);
        assert!(matches!(attempt.error, Some(ReconcileError::Create(_))));
    }

    #[test]
    fn rejected_update_without_replace() {
        let cluster = MemoryCluster::new();
        cluster.insert(&configmaps(), config_map("a", "1")).unwrap();
        cluster.inject(Fault::new(Operation::Update, StoreError::Invalid("immutable".into())));

        let mut r = config_map("a", "2");
        let attempt = apply_one(&cluster, &cluster, &mut r, false);
        assert_eq!(attempt.action, ResourceAction::Update);
        assert!(matches!(attempt.error, Some(ReconcileError::Update(_))));
        assert_eq!(cluster.count(Operation::Delete), 0);
    }

    #[test]
    fn rejected_update_with_replace() {
        let cluster = MemoryCluster::new();
        let stored = cluster.insert(&configmaps(), config_map("a", "1")).unwrap();
        cluster.inject(Fault::new(Operation::Update, StoreError::Invalid("immutable".into())));

        let mut r = config_map("a", "2");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert!(attempt.is_ok());
        assert_eq!(attempt.action, ResourceAction::Replace);
        assert!(r.resource_version().is_none());
        assert_eq!(cluster.count(Operation::Delete), 1);

        let now = cluster.object(&configmaps(), Some("default"), "a").unwrap();
        assert_ne!(now.uid(), stored.uid());
        assert_eq!(now.field(&["data", "value"]), Some(&json!("2")));
    }

    #[test]
    fn delete_failure_during_replace() {
        let cluster = MemoryCluster::new();
        cluster.insert(&configmaps(), config_map("a", "1")).unwrap();
        cluster.inject(Fault::new(Operation::Update, StoreError::Invalid("immutable".into())));
        cluster.inject(Fault::new(Operation::Delete, StoreError::Unavailable("busy".into())));

        let mut r = config_map("a", "2");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert_eq!(attempt.action, ResourceAction::Replace);
        assert!(matches!(attempt.error, Some(ReconcileError::Delete(_))));
        // The token from the failed update is still on the resource.
        assert!(r.resource_version().is_some());
    }

    #[test]
    fn create_failure_during_replace() {
        let cluster = MemoryCluster::new();
        cluster.insert(&configmaps(), config_map("a", "1")).unwrap();
        cluster.inject(Fault::new(Operation::Update, StoreError::Invalid("immutable".into())));
        cluster.inject(Fault::new(Operation::Create, StoreError::Invalid("still bad".into())));

        let mut r = config_map("a", "2");
        let attempt = apply_one(&cluster, &cluster, &mut r, true);
        assert_eq!(attempt.action, ResourceAction::Replace);
        assert!(matches!(attempt.error, Some(ReconcileError::Create(_))));
        assert!(cluster.object(&configmaps(), Some("default"), "a").is_none());
    }
}
