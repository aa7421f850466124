//! compkit - component registry client
//!
//! Given a component name, compkit resolves its full dependency closure from a registry
//! (other registry components plus third-party packages), rewrites the fetched sources so
//! they fit the target project, and installs them all-or-nothing.
//!
//! # Architecture Overview
//!
//! The pipeline has three stages, each a module:
//!
//! 1. [`resolver`] - breadth-first resolution over a [`registry::RegistrySource`], with cycle
//!    detection, a deterministic version-conflict policy and package range merging
//! 2. [`transform`] - an ordered chain of [`transform::Transformer`]s that rewrite import
//!    paths, style references, component identifiers and type-only constructs
//! 3. [`installer`] - stages every output file beside its target, checks for conflicts,
//!    then promotes all of them in one [`installer::InstallTransaction`] with rollback
//!
//! # Core Modules
//!
//! - [`core`] - Error taxonomy and user-facing error display
//! - [`models`] - Component references and manifests as served by the registry
//! - [`version`] - Version ordering and package range algebra
//! - [`storage`] - Storage backends a registry can be served from
//! - [`registry`] - HTTP and storage-backed registry clients, retry policy
//! - [`cli`] - Command-line interface
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Install a component and everything it depends on
//! compkit add button --registry https://registry.example.com --to src/components
//!
//! # Resolve and transform only, write nothing
//! compkit add dialog --dry-run
//!
//! # Browse the registry
//! compkit list
//! ```

pub mod cli;
pub mod constants;
pub mod core;
pub mod installer;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod transform;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
