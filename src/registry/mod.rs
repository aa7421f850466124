//! Registry clients.
//!
//! A registry publishes component manifests by name and version. The rest of the pipeline
//! only talks to the [`RegistrySource`] trait, so the same resolver works against:
//!
//! - [`HttpRegistryClient`] - the registry HTTP contract (`GET /components`,
//!   `GET /components/{name}`, `GET /components/{name}/versions/{version}`)
//! - [`StorageRegistry`] - the same data read straight from a [`crate::storage::StorageProvider`]
//!   (local directories, `file://` URLs, in-memory fixtures)
//!
//! Clients never retry. Retrying is the caller's job and is implemented by [`RetryPolicy`],
//! which the resolver wraps around every fetch.

mod http;
mod retry;
mod storage;

pub use http::HttpRegistryClient;
pub use retry::RetryPolicy;
pub use storage::StorageRegistry;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::Result;
use crate::models::{ComponentManifest, ComponentSummary};
use crate::storage::FsStorage;

/// Read access to a component registry.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Fetch the manifest of `name` at `version`, or at the latest version when `None`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the component or version is not published, `Unreachable` /
    /// `RateLimited` on transport failures, `InvalidManifest` when the payload fails
    /// validation.
    async fn fetch_manifest(&self, name: &str, version: Option<&str>)
    -> Result<ComponentManifest>;

    /// Every published version of `name`, ascending.
    async fn list_versions(&self, name: &str) -> Result<Vec<String>>;

    /// Every published component, sorted by name.
    async fn list_components(&self) -> Result<Vec<ComponentSummary>>;

    /// Human-readable location, used in log lines.
    fn location(&self) -> String;
}

/// Open the registry a `--registry` argument points at.
///
/// `http://` and `https://` URLs use the HTTP client; `file://` URLs and plain paths are
/// read from disk.
///
/// # Errors
///
/// Fails when the HTTP client cannot be constructed.
pub fn open_registry(location: &str) -> Result<Arc<dyn RegistrySource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(Arc::new(HttpRegistryClient::new(location)?));
    }
    let path = location.strip_prefix("file://").unwrap_or(location);
    Ok(Arc::new(StorageRegistry::new(FsStorage::new(PathBuf::from(path)), location)))
}
