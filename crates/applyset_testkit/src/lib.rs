//! # applyset testkit
//!
//! Test utilities for applyset.
//!
//! This crate provides:
//! - Manifest fixtures for core types and schema extensions
//! - Property-based test generators using proptest
//! - Log output for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use applyset_testkit::prelude::*;
//!
//! #[test]
//! fn applies_config_maps() {
//!     init_tracing();
//!     let resources = vec![config_map("default", "a"), config_map("default", "b")];
//!     // ... reconcile resources
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
