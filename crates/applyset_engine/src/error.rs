//! Error types for the reconciliation engine.

use crate::cluster::{ResolveError, StoreError};
use applyset_model::{ResourceStatus, VersionedBatch};
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that can occur while reconciling a batch.
///
/// Per-resource errors (`MissingName` through `Delete`) are recorded in the
/// resource's status and never abort a reconciliation. The others are
/// returned from [`Reconciler::apply`](crate::Reconciler::apply).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// The resource has no name.
    #[error("missing resource name")]
    MissingName,

    /// The resource type could not be mapped to a storage path.
    #[error("get REST mapping for {gvk}: {source}")]
    Mapping {
        /// Type descriptor that failed to resolve.
        gvk: String,
        /// Resolver error.
        #[source]
        source: ResolveError,
    },

    /// Fetching the existing object failed.
    #[error("get resource: {0}")]
    Get(#[source] StoreError),

    /// Creating the object failed.
    #[error("create resource: {0}")]
    Create(#[source] StoreError),

    /// Updating the existing object failed.
    #[error("update resource: {0}")]
    Update(#[source] StoreError),

    /// Deleting the existing object before re-creation failed.
    #[error("delete resource: {0}")]
    Delete(#[source] StoreError),

    /// Listing existing batch records failed.
    #[error("list existing batches: {0}")]
    List(#[source] StoreError),

    /// Creating the batch record failed.
    #[error("create batch record {name:?}: {source}")]
    BatchCreate {
        /// Name of the record.
        name: String,
        /// Store error.
        #[source]
        source: StoreError,
    },

    /// A batch name does not have the `<base>.v<version>` shape.
    #[error("invalid batch name {0:?}")]
    InvalidBatchName(String),

    /// The resource is already owned by a batch with another base name.
    #[error("{resource} is owned by conflicting batch {owner:?}")]
    ConflictingOwner {
        /// Resource key.
        resource: String,
        /// Name of the conflicting owner.
        owner: String,
    },

    /// The resource is already owned by a newer version of this batch.
    #[error("{resource} is owned by newer batch {owner:?}, refusing to apply version {version}")]
    OwnerVersionRegression {
        /// Resource key.
        resource: String,
        /// Name of the newer owner.
        owner: String,
        /// Version being applied.
        version: u32,
    },

    /// Schema extensions did not become servable in time.
    #[error("schema extensions not available after {timeout:?}: {pending:?}")]
    SchemaAvailabilityTimeout {
        /// How long the gate waited.
        timeout: Duration,
        /// Keys of the schema extensions still missing.
        pending: Vec<String>,
    },

    /// The caller cancelled the reconciliation or its deadline passed.
    #[error("reconciliation cancelled")]
    Cancelled,

    /// A manifest or record could not be read or converted.
    #[error("malformed {what}: {message}")]
    Malformed {
        /// What was being read.
        what: String,
        /// Description of the problem.
        message: String,
    },
}

impl ReconcileError {
    pub(crate) fn malformed(what: impl Into<String>, err: impl ToString) -> Self {
        Self::Malformed {
            what: what.into(),
            message: err.to_string(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::MissingName => ErrorKind::MissingName,
            ReconcileError::Mapping { .. } => ErrorKind::Mapping,
            ReconcileError::Get(_) => ErrorKind::Get,
            ReconcileError::Create(_) | ReconcileError::BatchCreate { .. } => ErrorKind::Create,
            ReconcileError::Update(_) => ErrorKind::Update,
            ReconcileError::Delete(_) => ErrorKind::Delete,
            ReconcileError::List(_) => ErrorKind::List,
            ReconcileError::InvalidBatchName(_) => ErrorKind::InvalidBatchName,
            ReconcileError::ConflictingOwner { .. } => ErrorKind::ConflictingOwner,
            ReconcileError::OwnerVersionRegression { .. } => ErrorKind::OwnerVersionRegression,
            ReconcileError::SchemaAvailabilityTimeout { .. } => {
                ErrorKind::SchemaAvailabilityTimeout
            }
            ReconcileError::Cancelled => ErrorKind::Cancelled,
            ReconcileError::Malformed { .. } => ErrorKind::Malformed,
        }
    }
}

/// Coarse classification of [`ReconcileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ReconcileError::MissingName`].
    MissingName,
    /// See [`ReconcileError::Mapping`].
    Mapping,
    /// See [`ReconcileError::Get`].
    Get,
    /// See [`ReconcileError::Create`] and [`ReconcileError::BatchCreate`].
    Create,
    /// See [`ReconcileError::Update`].
    Update,
    /// See [`ReconcileError::Delete`].
    Delete,
    /// See [`ReconcileError::List`].
    List,
    /// See [`ReconcileError::InvalidBatchName`].
    InvalidBatchName,
    /// See [`ReconcileError::ConflictingOwner`].
    ConflictingOwner,
    /// See [`ReconcileError::OwnerVersionRegression`].
    OwnerVersionRegression,
    /// See [`ReconcileError::SchemaAvailabilityTimeout`].
    SchemaAvailabilityTimeout,
    /// See [`ReconcileError::Cancelled`].
    Cancelled,
    /// See [`ReconcileError::Malformed`].
    Malformed,
}

/// A reconciliation that could not run to completion.
///
/// Carries whatever was recorded before the failure: the batch record, if
/// it was created, and the status of every resource.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct ApplyError {
    /// The batch record, if it was created before the failure.
    pub batch: Option<Box<VersionedBatch>>,
    /// Statuses recorded before the failure, in resource key order.
    pub statuses: Vec<ResourceStatus>,
    /// The error that stopped the reconciliation.
    #[source]
    pub source: ReconcileError,
}

impl ApplyError {
    pub(crate) fn new(
        batch: Option<VersionedBatch>,
        statuses: Vec<ResourceStatus>,
        source: ReconcileError,
    ) -> Self {
        Self {
            batch: batch.map(Box::new),
            statuses,
            source,
        }
    }

    /// Returns the kind of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(ReconcileError::MissingName.to_string(), "missing resource name");

        let err = ReconcileError::Update(StoreError::Invalid("field is immutable".into()));
        assert_eq!(err.to_string(), "update resource: invalid: field is immutable");

        let err = ReconcileError::OwnerVersionRegression {
            resource: "/v1/ConfigMap/default/a".into(),
            owner: "app.v5".into(),
            version: 4,
        };
        assert!(err.to_string().contains("app.v5"));
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn kinds() {
        assert_eq!(ReconcileError::MissingName.kind(), ErrorKind::MissingName);
        assert_eq!(
            ReconcileError::BatchCreate {
                name: "app.v1".into(),
                source: StoreError::Unavailable("down".into()),
            }
            .kind(),
            ErrorKind::Create
        );
        assert_eq!(ReconcileError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn apply_error_exposes_source() {
        use std::error::Error as _;

        let err = ApplyError::new(None, Vec::new(), ReconcileError::Cancelled);
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.to_string(), "reconciliation cancelled");
        assert!(err.source().is_some());
    }
}
