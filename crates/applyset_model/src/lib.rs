//! # applyset model
//!
//! Resource and batch types for applyset.
//!
//! This crate provides:
//! - `Resource`, an untyped manifest with typed metadata accessors
//! - Group/version/kind descriptors and the resource identity key
//! - `VersionedBatch`, the record describing one reconciliation attempt
//! - Batch naming (`<base>.v<version>`) encode/decode
//! - Owner references and per-resource status types
//! - Conversion between typed records and the untyped wire form
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod convert;
mod error;
mod gvk;
mod key;
mod naming;
mod owner;
mod resource;
mod schema;
mod status;

pub use batch::{
    group_refs, BatchGroup, BatchMeta, BatchPhase, BatchSpec, BatchStatus, ResourceRef,
    VersionedBatch, BATCH_NAME_LABEL,
};
pub use convert::{from_wire, to_wire};
pub use error::{ModelError, ModelResult};
pub use gvk::{GroupVersion, GroupVersionKind, GroupVersionResource};
pub use key::{resource_key, sort_resources, ResourceKey};
pub use naming::{batch_name, decode_batch_name, is_valid_base_name};
pub use owner::OwnerReference;
pub use resource::Resource;
pub use schema::{is_schema_extension, SchemaDefinition, SCHEMA_GROUP, SCHEMA_KIND};
pub use status::{ResourceAction, ResourceStatus};
