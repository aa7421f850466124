//! Storage backends a registry can be served from.
//!
//! [`StorageProvider`] is the small key/value contract a registry needs: write, read,
//! ordered listing by prefix, and delete. Keys are `/`-separated relative paths.
//!
//! - [`FsStorage`] keeps objects as files under a root directory (used for directory and
//!   `file://` registries)
//! - [`MemoryStorage`] keeps them in a sorted map (used by tests and fixtures)

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use walkdir::WalkDir;

use crate::core::{CompkitError, Result};

/// Key/value object storage addressed by relative paths.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Store `bytes` at `path`, replacing any previous object.
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read the object at `path`.
    ///
    /// Fails with [`CompkitError::NotFound`] when the object does not exist.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Every object path starting with `prefix`, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove the object at `path`. Removing a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

fn missing(path: &str) -> CompkitError {
    CompkitError::NotFound {
        name: path.to_string(),
        version: None,
    }
}

/// Reject keys that would escape the storage root.
fn check_key(path: &str) -> Result<()> {
    let escapes = Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if path.is_empty() || escapes {
        return Err(CompkitError::Other {
            message: format!("Invalid storage key '{path}'"),
        });
    }
    Ok(())
}

/// Storage backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create a storage rooted at `root`. The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageProvider for FsStorage {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        check_key(path)?;
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CompkitError::fs("create directory", parent, &e))?;
        }
        tokio::fs::write(&full, bytes).await.map_err(|e| CompkitError::fs("write", &full, &e))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        check_key(path)?;
        let full = self.root.join(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(missing(path)),
            Err(e) => Err(CompkitError::fs("read", &full, &e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        let listing = tokio::task::spawn_blocking(move || {
            if !root.is_dir() {
                return Vec::new();
            }
            let mut paths: Vec<String> = WalkDir::new(&root)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| {
                    let relative = entry.path().strip_prefix(&root).ok()?;
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    key.starts_with(&prefix).then_some(key)
                })
                .collect();
            paths.sort();
            paths
        })
        .await
        .map_err(|e| CompkitError::Other {
            message: format!("Storage listing task failed: {e}"),
        })?;
        Ok(listing)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        check_key(path)?;
        let full = self.root.join(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CompkitError::fs("delete", &full, &e)),
        }
    }
}

/// In-memory storage with sorted keys.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        check_key(path)?;
        self.objects.write().await.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.objects.read().await.get(path).cloned().ok_or_else(|| missing(path))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.write().await.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn exercise(storage: &dyn StorageProvider) -> Result<()> {
        storage.write("components/card/1.0.0.json", b"{}").await?;
        storage.write("components/button/1.0.0.json", b"{}").await?;
        storage.write("components/button/0.9.0.json", b"{}").await?;
        storage.write("other/readme", b"hi").await?;

        assert_eq!(
            storage.list("components/button/").await?,
            vec!["components/button/0.9.0.json", "components/button/1.0.0.json"]
        );
        assert_eq!(storage.list("components/").await?.len(), 3);
        assert_eq!(storage.read("other/readme").await?, b"hi");

        storage.delete("other/readme").await?;
        storage.delete("other/readme").await?;
        assert!(matches!(storage.read("other/readme").await, Err(CompkitError::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_storage_contract() -> Result<()> {
        exercise(&MemoryStorage::new()).await
    }

    #[tokio::test]
    async fn test_fs_storage_contract() -> Result<()> {
        let temp = TempDir::new().unwrap();
        exercise(&FsStorage::new(temp.path().join("registry"))).await
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let temp = TempDir::new().unwrap();
        let storage = FsStorage::new(temp.path());
        assert!(storage.write("../outside", b"x").await.is_err());
        assert!(storage.read("/etc/passwd").await.is_err());
    }
}
