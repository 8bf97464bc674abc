//! Configuration for the reconciliation engine.

use crate::cancel::CancelToken;
use crate::error::{ReconcileError, ReconcileResult};
use applyset_model::{GroupVersion, GroupVersionKind, GroupVersionResource};
use std::time::{Duration, Instant};

/// Type descriptor of the batch record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchType {
    /// API group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Kind; also the relation kind of owner references.
    pub kind: String,
    /// Plural resource name.
    pub plural: String,
}

impl BatchType {
    /// Returns the `apiVersion` string of batch records.
    pub fn api_version(&self) -> String {
        GroupVersion::new(self.group.clone(), self.version.clone()).api_version()
    }

    /// Returns the type descriptor of batch records.
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::new(self.group.clone(), self.version.clone(), self.kind.clone())
    }

    /// Returns the storage path of batch records. Records are cluster-scoped.
    pub fn resource(&self) -> GroupVersionResource {
        GroupVersionResource::new(self.group.clone(), self.version.clone(), self.plural.clone())
    }
}

impl Default for BatchType {
    fn default() -> Self {
        Self {
            group: "apps.applyset.dev".into(),
            version: "v1alpha1".into(),
            kind: "ResourceSet".into(),
            plural: "resourcesets".into(),
        }
    }
}

/// Configuration for a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Type of the batch record.
    pub batch_type: BatchType,
    /// Interval between schema availability checks.
    pub schema_poll_interval: Duration,
    /// How long to wait for schema extensions to become servable.
    pub schema_timeout: Duration,
    /// Upper bound on apply passes over regular resources.
    pub max_passes: u32,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            batch_type: BatchType::default(),
            schema_poll_interval: Duration::from_secs(2),
            schema_timeout: Duration::from_secs(120),
            max_passes: 10,
        }
    }

    /// Sets the batch record type.
    pub fn with_batch_type(mut self, batch_type: BatchType) -> Self {
        self.batch_type = batch_type;
        self
    }

    /// Sets the schema poll interval.
    pub fn with_schema_poll_interval(mut self, interval: Duration) -> Self {
        self.schema_poll_interval = interval;
        self
    }

    /// Sets the schema availability timeout.
    pub fn with_schema_timeout(mut self, timeout: Duration) -> Self {
        self.schema_timeout = timeout;
        self
    }

    /// Sets the maximum number of apply passes (at least one).
    pub fn with_max_passes(mut self, passes: u32) -> Self {
        self.max_passes = passes.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call options for [`Reconciler::apply`](crate::Reconciler::apply).
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Token that aborts the call between stages.
    pub cancel: Option<CancelToken>,
    /// Point in time after which the call gives up.
    pub deadline: Option<Instant>,
}

impl ApplyOptions {
    /// Creates options with no cancellation and no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to now.
    ///
    /// A timeout too large to express as a point in time leaves the
    /// deadline unset.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Fails with `Cancelled` if the token fired or the deadline passed.
    pub(crate) fn check(&self) -> ReconcileResult<()> {
        let cancelled = self.cancel.as_ref().is_some_and(CancelToken::is_cancelled);
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        if cancelled || expired {
            Err(ReconcileError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration`, waking early on cancellation.
    ///
    /// The sleep is cut short at the deadline.
    pub(crate) fn pause(&self, duration: Duration) -> ReconcileResult<()> {
        self.check()?;
        let duration = match self.deadline {
            Some(deadline) => duration.min(deadline.saturating_duration_since(Instant::now())),
            None => duration,
        };
        match &self.cancel {
            Some(token) => {
                token.wait_timeout(duration);
            }
            None => std::thread::sleep(duration),
        }
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.schema_poll_interval, Duration::from_secs(2));
        assert_eq!(config.schema_timeout, Duration::from_secs(120));
        assert_eq!(config.max_passes, 10);
        assert_eq!(config.batch_type.api_version(), "apps.applyset.dev/v1alpha1");
        assert_eq!(config.batch_type.resource().resource, "resourcesets");
    }

    #[test]
    fn engine_config_builder() {
        let config = EngineConfig::new()
            .with_schema_poll_interval(Duration::from_millis(10))
            .with_schema_timeout(Duration::from_millis(100))
            .with_max_passes(0);

        assert_eq!(config.schema_poll_interval, Duration::from_millis(10));
        assert_eq!(config.schema_timeout, Duration::from_millis(100));
        assert_eq!(config.max_passes, 1);
    }

    #[test]
    fn options_check() {
        assert!(ApplyOptions::new().check().is_ok());

        let token = CancelToken::new();
        let options = ApplyOptions::new().with_cancel_token(token.clone());
        assert!(options.check().is_ok());
        token.cancel();
        assert_eq!(options.check(), Err(ReconcileError::Cancelled));

        let expired = ApplyOptions::new().with_deadline(Instant::now());
        assert_eq!(expired.check(), Err(ReconcileError::Cancelled));
    }

    #[test]
    fn pause_stops_at_deadline() {
        let options = ApplyOptions::new().with_timeout(Duration::from_millis(20));
        let start = Instant::now();
        assert_eq!(
            options.pause(Duration::from_secs(30)),
            Err(ReconcileError::Cancelled)
        );
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn unbounded_timeout_leaves_deadline_unset() {
        let options = ApplyOptions::new().with_timeout(Duration::MAX);
        assert!(options.deadline.is_none());
        assert!(options.check().is_ok());

        let token = CancelToken::new();
        let options = ApplyOptions::new()
            .with_cancel_token(token.clone())
            .with_timeout(Duration::MAX);
        token.cancel();
        assert_eq!(
            options.pause(Duration::MAX),
            Err(ReconcileError::Cancelled)
        );
    }
}
