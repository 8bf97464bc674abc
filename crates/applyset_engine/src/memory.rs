//! In-memory cluster for tests and dry runs.

use crate::cluster::{
    ApiResource, Discovery, DiscoveryError, ObjectStore, ResolveError, Scope, StoreError,
    StoreResult, TypeMapping, TypeResolver,
};
use crate::config::BatchType;
use applyset_model::{
    GroupVersion, GroupVersionKind, GroupVersionResource, Resource, SchemaDefinition, SCHEMA_GROUP,
    SCHEMA_KIND,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

const SCHEMA_PLURAL: &str = "customresourcedefinitions";

/// A collaborator operation, used for fault injection and the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`ObjectStore::get`].
    Get,
    /// [`ObjectStore::list`].
    List,
    /// [`ObjectStore::create`].
    Create,
    /// [`ObjectStore::update`].
    Update,
    /// [`ObjectStore::delete`].
    Delete,
    /// [`TypeResolver::resolve`].
    Resolve,
    /// [`Discovery::resources_for`].
    Discover,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Get => "get",
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Resolve => "resolve",
            Operation::Discover => "discover",
        };
        f.write_str(s)
    }
}

/// A recorded collaborator call.
///
/// `subject` is the object name for store calls other than `List`, the
/// kind for `Resolve`, and empty for `List` and `Discover`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// The operation.
    pub operation: Operation,
    /// Storage path, type descriptor or group/version, rendered.
    pub target: String,
    /// Namespace argument, if any.
    pub namespace: Option<String>,
    /// Object name or kind.
    pub subject: String,
}

/// An injected failure.
///
/// A fault fires on every matching call until its count runs out. Errors
/// are returned as given by store operations; resolver and discovery calls
/// report them as unavailability.
#[derive(Debug, Clone)]
pub struct Fault {
    operation: Operation,
    subject: Option<String>,
    remaining: Option<u32>,
    error: StoreError,
}

impl Fault {
    /// Creates a fault for every call of `operation`.
    #[must_use]
    pub fn new(operation: Operation, error: StoreError) -> Self {
        Self {
            operation,
            subject: None,
            remaining: None,
            error,
        }
    }

    /// Restricts the fault to calls whose subject is `subject`.
    #[must_use]
    pub fn for_name(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Limits the fault to the next `n` matching calls.
    #[must_use]
    pub fn times(mut self, n: u32) -> Self {
        self.remaining = Some(n);
        self
    }

    fn matches(&self, call: &Call) -> bool {
        self.operation == call.operation
            && self.subject.as_deref().map_or(true, |s| s == call.subject)
    }
}

#[derive(Debug, Clone)]
struct TypeEntry {
    gvk: GroupVersionKind,
    resource: GroupVersionResource,
    scope: Scope,
}

impl TypeEntry {
    fn new(group: &str, version: &str, kind: &str, plural: &str, scope: Scope) -> Self {
        Self {
            gvk: GroupVersionKind::new(group, version, kind),
            resource: GroupVersionResource::new(group, version, plural),
            scope,
        }
    }

    fn mapping(&self) -> TypeMapping {
        TypeMapping {
            resource: self.resource.clone(),
            scope: self.scope,
        }
    }
}

/// Objects are stored per group, not per version, so one object is visible
/// through every served version of its type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectId {
    group: String,
    resource: String,
    namespace: String,
    name: String,
}

impl ObjectId {
    fn new(gvr: &GroupVersionResource, namespace: Option<&str>, name: &str) -> Self {
        Self {
            group: gvr.group.clone(),
            resource: gvr.resource.clone(),
            namespace: namespace.unwrap_or_default().to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug)]
struct State {
    objects: BTreeMap<ObjectId, Resource>,
    types: Vec<TypeEntry>,
    last_version: u64,
    faults: Vec<Fault>,
    calls: Vec<Call>,
    serve_schemas: bool,
    invalidations: usize,
}

impl State {
    fn record(&mut self, call: Call) -> Option<StoreError> {
        let hit = self.faults.iter().position(|f| f.matches(&call));
        self.calls.push(call);

        let index = hit?;
        let fault = &mut self.faults[index];
        let error = fault.error.clone();
        let exhausted = match fault.remaining.as_mut() {
            Some(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
            None => false,
        };
        if exhausted {
            self.faults.remove(index);
        }
        Some(error)
    }

    /// Registered types plus the types defined by stored schema extensions.
    fn served_types(&self) -> Vec<TypeEntry> {
        let mut types = self.types.clone();
        if !self.serve_schemas {
            return types;
        }
        for (id, object) in &self.objects {
            if id.group != SCHEMA_GROUP || id.resource != SCHEMA_PLURAL {
                continue;
            }
            let Ok(def) = SchemaDefinition::from_resource(object) else {
                continue;
            };
            let scope = match object.field(&["spec", "scope"]).and_then(|v| v.as_str()) {
                Some("Cluster") => Scope::Cluster,
                _ => Scope::Namespaced,
            };
            types.push(TypeEntry::new(
                &def.group,
                &def.version,
                &def.kind,
                &def.plural,
                scope,
            ));
        }
        types
    }

    fn is_known(&self, gvr: &GroupVersionResource) -> bool {
        self.served_types().iter().any(|t| &t.resource == gvr)
    }

    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    fn create(
        &mut self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        object: &Resource,
    ) -> StoreResult<Resource> {
        if !self.is_known(gvr) {
            return Err(StoreError::Invalid(format!("unknown resource {gvr}")));
        }
        if object.name().is_empty() {
            return Err(StoreError::Invalid("name is required".into()));
        }
        if object.resource_version().is_some() {
            return Err(StoreError::Invalid(
                "resourceVersion must not be set on create".into(),
            ));
        }
        let id = ObjectId::new(gvr, namespace, object.name());
        if self.objects.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                resource: gvr.to_string(),
                name: id.name,
            });
        }

        let mut stored = object.clone();
        if let Some(ns) = namespace {
            stored.set_namespace(ns);
        }
        stored.set_uid(Uuid::new_v4().to_string());
        let version = self.next_version();
        stored.set_resource_version(Some(&version));
        self.objects.insert(id, stored.clone());
        Ok(stored)
    }
}

/// A thread-safe in-memory cluster.
///
/// Implements [`ObjectStore`], [`TypeResolver`] and [`Discovery`]. Stored
/// objects get a uid and a resource version; updates must carry the
/// current resource version. The type registry starts with a few core
/// types, the schema-extension types and the default batch type. Once a
/// schema extension is stored, the type it defines is resolvable and
/// discoverable, unless serving is switched off with
/// [`set_serve_schemas`](MemoryCluster::set_serve_schemas).
///
/// Every collaborator call is logged, and failures can be injected per
/// operation and name.
///
/// # Example
///
/// ```rust
/// use applyset_engine::{MemoryCluster, ObjectStore};
/// use applyset_model::{GroupVersionResource, Resource};
///
/// let cluster = MemoryCluster::new();
/// let configmaps = GroupVersionResource::new("", "v1", "configmaps");
///
/// let mut cm = Resource::new("v1", "ConfigMap");
/// cm.set_name("settings");
/// let stored = cluster.create(&configmaps, Some("default"), &cm).unwrap();
/// assert!(stored.uid().is_some());
/// ```
#[derive(Debug)]
pub struct MemoryCluster {
    state: Mutex<State>,
}

impl MemoryCluster {
    /// Creates an empty cluster serving the built-in types.
    #[must_use]
    pub fn new() -> Self {
        let batch = BatchType::default();
        let types = vec![
            TypeEntry::new("", "v1", "ConfigMap", "configmaps", Scope::Namespaced),
            TypeEntry::new("", "v1", "Secret", "secrets", Scope::Namespaced),
            TypeEntry::new("", "v1", "Service", "services", Scope::Namespaced),
            TypeEntry::new("", "v1", "Namespace", "namespaces", Scope::Cluster),
            TypeEntry::new("apps", "v1", "Deployment", "deployments", Scope::Namespaced),
            TypeEntry::new(SCHEMA_GROUP, "v1beta1", SCHEMA_KIND, SCHEMA_PLURAL, Scope::Cluster),
            TypeEntry::new(SCHEMA_GROUP, "v1", SCHEMA_KIND, SCHEMA_PLURAL, Scope::Cluster),
            TypeEntry::new(
                &batch.group,
                &batch.version,
                &batch.kind,
                &batch.plural,
                Scope::Cluster,
            ),
        ];
        Self {
            state: Mutex::new(State {
                objects: BTreeMap::new(),
                types,
                last_version: 0,
                faults: Vec::new(),
                calls: Vec::new(),
                serve_schemas: true,
                invalidations: 0,
            }),
        }
    }

    /// Registers an additional type.
    pub fn register_type(&self, gvk: GroupVersionKind, plural: impl Into<String>, scope: Scope) {
        let resource = GroupVersionResource::new(gvk.group.clone(), gvk.version.clone(), plural);
        self.state.lock().types.push(TypeEntry {
            gvk,
            resource,
            scope,
        });
    }

    /// Registers a batch record type.
    pub fn register_batch_type(&self, batch_type: &BatchType) {
        self.register_type(batch_type.gvk(), batch_type.plural.clone(), Scope::Cluster);
    }

    /// Switches serving of schema-defined types on or off.
    pub fn set_serve_schemas(&self, serve: bool) {
        self.state.lock().serve_schemas = serve;
    }

    /// Stores an object directly, bypassing faults and the call log.
    ///
    /// The namespace is taken from the object.
    pub fn insert(&self, gvr: &GroupVersionResource, object: Resource) -> StoreResult<Resource> {
        let namespace = Some(object.namespace()).filter(|ns| !ns.is_empty());
        self.state.lock().create(gvr, namespace, &object)
    }

    /// Returns a stored object, bypassing faults and the call log.
    pub fn object(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<Resource> {
        let id = ObjectId::new(gvr, namespace, name);
        self.state.lock().objects.get(&id).cloned()
    }

    /// Returns all stored objects of a type.
    pub fn objects(&self, gvr: &GroupVersionResource) -> Vec<Resource> {
        self.state
            .lock()
            .objects
            .iter()
            .filter(|(id, _)| id.group == gvr.group && id.resource == gvr.resource)
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// Adds a fault.
    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.push(fault);
    }

    /// Removes all faults.
    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Returns the call log.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Clears the call log.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Counts logged calls of `operation`.
    pub fn count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Counts logged calls of `operation` on `subject`.
    pub fn count_for(&self, operation: Operation, subject: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation && c.subject == subject)
            .count()
    }

    /// Returns how often the discovery cache was invalidated.
    pub fn invalidations(&self) -> usize {
        self.state.lock().invalidations
    }
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn store_call(
    operation: Operation,
    gvr: &GroupVersionResource,
    namespace: Option<&str>,
    subject: &str,
) -> Call {
    Call {
        operation,
        target: gvr.to_string(),
        namespace: namespace.map(str::to_string),
        subject: subject.to_string(),
    }
}

fn not_found(gvr: &GroupVersionResource, name: &str) -> StoreError {
    StoreError::NotFound {
        resource: gvr.to_string(),
        name: name.to_string(),
    }
}

impl ObjectStore for MemoryCluster {
    fn get(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> StoreResult<Resource> {
        let mut state = self.state.lock();
        if let Some(err) = state.record(store_call(Operation::Get, resource, namespace, name)) {
            return Err(err);
        }
        if !state.is_known(resource) {
            return Err(not_found(resource, name));
        }
        state
            .objects
            .get(&ObjectId::new(resource, namespace, name))
            .cloned()
            .ok_or_else(|| not_found(resource, name))
    }

    fn list(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<Resource>> {
        let mut state = self.state.lock();
        if let Some(err) = state.record(store_call(Operation::List, resource, namespace, "")) {
            return Err(err);
        }
        if !state.is_known(resource) {
            return Err(not_found(resource, ""));
        }
        Ok(state
            .objects
            .iter()
            .filter(|(id, _)| id.group == resource.group && id.resource == resource.resource)
            .filter(|(id, _)| namespace.map_or(true, |ns| id.namespace == ns))
            .map(|(_, object)| object.clone())
            .collect())
    }

    fn create(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
        object: &Resource,
    ) -> StoreResult<Resource> {
        let mut state = self.state.lock();
        let call = store_call(Operation::Create, resource, namespace, object.name());
        if let Some(err) = state.record(call) {
            return Err(err);
        }
        state.create(resource, namespace, object)
    }

    fn update(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
        object: &Resource,
    ) -> StoreResult<Resource> {
        let mut state = self.state.lock();
        let call = store_call(Operation::Update, resource, namespace, object.name());
        if let Some(err) = state.record(call) {
            return Err(err);
        }

        let id = ObjectId::new(resource, namespace, object.name());
        let Some(current) = state.objects.get(&id) else {
            return Err(not_found(resource, object.name()));
        };
        if object.resource_version() != current.resource_version() {
            return Err(StoreError::Conflict(format!(
                "{resource} {:?} has resourceVersion {:?}, got {:?}",
                object.name(),
                current.resource_version().unwrap_or_default(),
                object.resource_version().unwrap_or_default(),
            )));
        }

        let uid = current.uid().map(str::to_string);
        let mut stored = object.clone();
        if let Some(ns) = namespace {
            stored.set_namespace(ns);
        }
        if let Some(uid) = uid {
            stored.set_uid(uid);
        }
        let version = state.next_version();
        stored.set_resource_version(Some(&version));
        state.objects.insert(id, stored.clone());
        Ok(stored)
    }

    fn delete(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.lock();
        if let Some(err) = state.record(store_call(Operation::Delete, resource, namespace, name)) {
            return Err(err);
        }
        state
            .objects
            .remove(&ObjectId::new(resource, namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(resource, name))
    }
}

impl TypeResolver for MemoryCluster {
    fn resolve(&self, gvk: &GroupVersionKind) -> Result<TypeMapping, ResolveError> {
        let mut state = self.state.lock();
        let call = Call {
            operation: Operation::Resolve,
            target: gvk.to_string(),
            namespace: None,
            subject: gvk.kind.clone(),
        };
        if let Some(err) = state.record(call) {
            return Err(ResolveError::Unavailable(err.to_string()));
        }
        state
            .served_types()
            .iter()
            .find(|t| &t.gvk == gvk)
            .map(TypeEntry::mapping)
            .ok_or_else(|| ResolveError::NoMapping(gvk.to_string()))
    }
}

impl Discovery for MemoryCluster {
    fn invalidate(&self) {
        self.state.lock().invalidations += 1;
    }

    fn resources_for(
        &self,
        group_version: &GroupVersion,
    ) -> Result<Vec<ApiResource>, DiscoveryError> {
        let mut state = self.state.lock();
        let call = Call {
            operation: Operation::Discover,
            target: group_version.to_string(),
            namespace: None,
            subject: String::new(),
        };
        if let Some(err) = state.record(call) {
            return Err(DiscoveryError::Unavailable(err.to_string()));
        }

        let resources: Vec<ApiResource> = state
            .served_types()
            .into_iter()
            .filter(|t| t.gvk.group == group_version.group && t.gvk.version == group_version.version)
            .map(|t| ApiResource {
                name: t.resource.resource,
                kind: t.gvk.kind,
                namespaced: t.scope == Scope::Namespaced,
            })
            .collect();
        if resources.is_empty() {
            return Err(DiscoveryError::NotFound(group_version.to_string()));
        }
        Ok(resources)
    }
}
