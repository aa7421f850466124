//! Test utilities for compkit
//!
//! Helpers shared by unit tests and the integration test target:
//! - Once-guarded tracing setup
//! - [`ManifestBuilder`] for concise component fixtures
//! - Registries pre-populated with fixtures, in memory or on disk
//! - [`FlakyRegistry`], which fails a fixed number of fetches before delegating
//!
//! # Example
//!
//! ```rust,no_run
//! use compkit_cli::test_utils::{ManifestBuilder, memory_registry};
//!
//! # async fn example() {
//! let registry = memory_registry([
//!     ManifestBuilder::new("dialog", "1.0.0").depends_on("button", "latest").build(),
//!     ManifestBuilder::new("button", "1.0.0").package("clsx", "^2.0.0").build(),
//! ])
//! .await;
//! # }
//! ```

use async_trait::async_trait;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::{CompkitError, Result};
use crate::models::{
    ComponentFile, ComponentManifest, ComponentRef, ComponentSummary, FileKind,
    ManifestDependencies,
};
use crate::registry::{RegistrySource, StorageRegistry};
use crate::storage::{FsStorage, MemoryStorage};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise `RUST_LOG`;
/// with neither, tests run without a subscriber.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Builder for [`ComponentManifest`] fixtures.
///
/// Without explicit files the manifest gets a single entry file `ui/<name>.tsx`.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    manifest: ComponentManifest,
}

impl ManifestBuilder {
    /// Start a manifest for `name@version`.
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            manifest: ComponentManifest {
                name: name.to_string(),
                version: version.to_string(),
                files: Vec::new(),
                dependencies: ManifestDependencies::default(),
                metadata: serde_json::Value::Null,
            },
        }
    }

    /// Add a file.
    #[must_use]
    pub fn file(mut self, path: &str, content: &str, kind: FileKind) -> Self {
        self.manifest.files.push(ComponentFile {
            path: path.to_string(),
            content: content.to_string(),
            kind,
        });
        self
    }

    /// Declare a component dependency (`version` may be `latest`).
    #[must_use]
    pub fn depends_on(mut self, name: &str, version: &str) -> Self {
        self.manifest.dependencies.components.push(ComponentRef::new(name, version));
        self
    }

    /// Declare a third-party package dependency.
    #[must_use]
    pub fn package(mut self, name: &str, range: &str) -> Self {
        self.manifest.dependencies.packages.insert(name.to_string(), range.to_string());
        self
    }

    /// Finish the manifest.
    #[must_use]
    pub fn build(mut self) -> ComponentManifest {
        if self.manifest.files.is_empty() {
            let name = &self.manifest.name;
            let ident = pascal_case(name.rsplit('/').next().unwrap_or(name));
            self.manifest.files.push(ComponentFile {
                path: format!("ui/{}.tsx", name.rsplit('/').next().unwrap_or(name)),
                content: format!("export function {ident}() {{\n  return null;\n}}\n"),
                kind: FileKind::Component,
            });
        }
        self.manifest
    }
}

fn pascal_case(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default()
        })
        .collect()
}

/// An in-memory registry holding `manifests`.
///
/// # Panics
///
/// Panics when a fixture fails to publish.
pub async fn memory_registry(
    manifests: impl IntoIterator<Item = ComponentManifest>,
) -> StorageRegistry<MemoryStorage> {
    let registry = StorageRegistry::new(MemoryStorage::new(), "memory");
    for manifest in manifests {
        registry.publish(&manifest).await.expect("publish fixture manifest");
    }
    registry
}

/// Publish `manifests` into a directory registry rooted at `root`.
///
/// # Panics
///
/// Panics when a fixture fails to publish.
pub async fn publish_to_directory(
    root: &Path,
    manifests: impl IntoIterator<Item = ComponentManifest>,
) {
    let registry = StorageRegistry::new(FsStorage::new(root), root.display().to_string());
    for manifest in manifests {
        registry.publish(&manifest).await.expect("publish fixture manifest");
    }
}

/// Registry wrapper whose first `failures` manifest fetches fail with `Unreachable`.
pub struct FlakyRegistry<R> {
    inner: R,
    failures: usize,
    calls: AtomicUsize,
}

impl<R: RegistrySource> FlakyRegistry<R> {
    /// Wrap `inner`.
    pub fn new(inner: R, failures: usize) -> Self {
        Self {
            inner,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch_manifest` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: RegistrySource> RegistrySource for FlakyRegistry<R> {
    async fn fetch_manifest(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<ComponentManifest> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(CompkitError::Unreachable {
                url: self.inner.location(),
                reason: "simulated transport failure".to_string(),
            });
        }
        self.inner.fetch_manifest(name, version).await
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        self.inner.list_versions(name).await
    }

    async fn list_components(&self) -> Result<Vec<ComponentSummary>> {
        self.inner.list_components().await
    }

    fn location(&self) -> String {
        self.inner.location()
    }
}
