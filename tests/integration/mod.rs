//! Integration test suite for compkit
//!
//! End-to-end tests that run the `compkit` binary against a directory registry in a
//! temporary project.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **add**: installing a component closure and the rewritten sources
//! - **conflicts**: file conflicts, `--force` and version conflicts
//! - **errors**: failures reported with their pipeline stage, nothing written
//! - **list**: registry listing
//! - **styles**: co-located and global stylesheet strategies

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod add;
mod conflicts;
mod errors;
mod list;
mod styles;
