//! Cluster collaborator abstractions.
//!
//! The engine never talks to a cluster directly. It is handed three
//! capability sets at construction: an object store, a type resolver and a
//! discovery service. Implementations may share one underlying client.

use applyset_model::{GroupVersion, GroupVersionKind, GroupVersionResource, Resource};
use thiserror::Error;

/// Result type for object store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by an [`ObjectStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{resource} {name:?} not found")]
    NotFound {
        /// Storage path of the object.
        resource: String,
        /// Object name.
        name: String,
    },

    /// An object with the same name already exists.
    #[error("{resource} {name:?} already exists")]
    AlreadyExists {
        /// Storage path of the object.
        resource: String,
        /// Object name.
        name: String,
    },

    /// The concurrency token did not match.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store rejected the object.
    #[error("invalid: {0}")]
    Invalid(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true if the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors returned by a [`TypeResolver`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No storage path is known for the type.
    #[error("no mapping for {0}")]
    NoMapping(String),

    /// The resolver could not answer.
    #[error("resolver unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by a [`Discovery`] service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The group/version is not served.
    #[error("group version {0} not found")]
    NotFound(String),

    /// The discovery endpoint could not answer.
    #[error("discovery unavailable: {0}")]
    Unavailable(String),
}

/// Whether objects of a type live in a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One object per name across the cluster.
    Cluster,
    /// One object per name within each namespace.
    Namespaced,
}

/// Storage location of a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeMapping {
    /// Storage path.
    pub resource: GroupVersionResource,
    /// Name scope.
    pub scope: Scope,
}

impl TypeMapping {
    /// Returns the namespace argument to use for `object` with this mapping.
    ///
    /// Cluster-scoped types take no namespace.
    pub fn namespace_of<'a>(&self, object: &'a Resource) -> Option<&'a str> {
        match self.scope {
            Scope::Cluster => None,
            Scope::Namespaced => Some(object.namespace()),
        }
    }
}

/// A resource type reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResource {
    /// Plural resource name.
    pub name: String,
    /// Kind served under this name.
    pub kind: String,
    /// Whether objects are namespaced.
    pub namespaced: bool,
}

/// CRUD access to cluster objects.
///
/// `namespace` is `None` for cluster-scoped types.
pub trait ObjectStore: Send + Sync {
    /// Fetches one object by name.
    fn get(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> StoreResult<Resource>;

    /// Lists all objects of a type, optionally within one namespace.
    fn list(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<Resource>>;

    /// Creates an object and returns the stored version.
    fn create(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
        object: &Resource,
    ) -> StoreResult<Resource>;

    /// Replaces an object and returns the stored version.
    ///
    /// `object` must carry the concurrency token of the stored version.
    fn update(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
        object: &Resource,
    ) -> StoreResult<Resource>;

    /// Deletes an object by name.
    fn delete(
        &self,
        resource: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> StoreResult<()>;
}

/// Maps type descriptors to storage paths.
pub trait TypeResolver: Send + Sync {
    /// Resolves the storage path and scope of a type.
    fn resolve(&self, gvk: &GroupVersionKind) -> Result<TypeMapping, ResolveError>;
}

/// Reports which resource types are currently served.
pub trait Discovery: Send + Sync {
    /// Drops any cached discovery state.
    fn invalidate(&self);

    /// Lists the resource types served under a group/version.
    fn resources_for(&self, group_version: &GroupVersion)
        -> Result<Vec<ApiResource>, DiscoveryError>;
}
