//! # applyset engine
//!
//! Reconciliation engine for versioned resource batches.
//!
//! This crate provides:
//! - Batch versioning (`<base>.v<n>`, strictly increasing per base name)
//! - Ownership links from applied resources to their batch
//! - Schema-extension installation and an availability gate
//! - The create/update/replace decision for a single resource
//! - A bounded convergence loop over regular resources
//! - An in-memory cluster for tests and dry runs
//!
//! ## Architecture
//!
//! A call to [`Reconciler::apply`] runs these stages in order:
//! 1. Drop empty manifests and order the rest by resource key
//! 2. Compute the next version and create the batch record
//! 3. Link every regular resource to the batch
//! 4. Install schema extensions and wait until they are served
//! 5. Apply regular resources in passes until failures stop changing
//!
//! The cluster is reached only through the [`ObjectStore`],
//! [`TypeResolver`] and [`Discovery`] traits handed to the reconciler.
//!
//! ## Key Invariants
//!
//! - Batch versions are never reused or decremented
//! - Schema extensions are served before any regular resource is applied
//! - Schema extensions are never replaced and never owned by a batch
//! - A resource that was applied successfully is not attempted again
//! - Per-resource failures never fail the call

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod cancel;
mod cluster;
mod config;
mod engine;
mod error;
mod memory;
mod ownership;
mod schema;
mod version;

pub use apply::{apply_one, Attempt};
pub use cancel::CancelToken;
pub use cluster::{
    ApiResource, Discovery, DiscoveryError, ObjectStore, ResolveError, Scope, StoreError,
    StoreResult, TypeMapping, TypeResolver,
};
pub use config::{ApplyOptions, BatchType, EngineConfig};
pub use engine::{ApplyReport, Reconciler};
pub use error::{ApplyError, ErrorKind, ReconcileError, ReconcileResult};
pub use memory::{Call, Fault, MemoryCluster, Operation};
pub use ownership::link_owner;
pub use schema::{is_served, wait_for_schemas, PendingSchema};
pub use version::{create_batch, next_version};
