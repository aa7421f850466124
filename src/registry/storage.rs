//! Registry served directly from a storage backend.
//!
//! Layout: one JSON manifest per published version at `components/<name>/<version>.json`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use super::RegistrySource;
use crate::core::{CompkitError, Result};
use crate::models::{ComponentManifest, ComponentSummary};
use crate::storage::StorageProvider;
use crate::version::{latest_version, sort_versions};

const COMPONENTS_PREFIX: &str = "components/";
const MANIFEST_EXTENSION: &str = ".json";

/// A registry whose manifests live in a [`StorageProvider`].
pub struct StorageRegistry<S> {
    storage: S,
    location: String,
}

impl<S: StorageProvider> StorageRegistry<S> {
    /// Wrap `storage`; `location` is only used for display.
    pub fn new(storage: S, location: impl Into<String>) -> Self {
        Self {
            storage,
            location: location.into(),
        }
    }

    fn manifest_key(name: &str, version: &str) -> String {
        format!("{COMPONENTS_PREFIX}{name}/{version}{MANIFEST_EXTENSION}")
    }

    /// Store a new manifest version.
    ///
    /// # Errors
    ///
    /// `InvalidManifest` when the manifest fails validation, `AlreadyPublished` when the
    /// version exists: published manifests are never modified in place.
    pub async fn publish(&self, manifest: &ComponentManifest) -> Result<()> {
        manifest.validate(&manifest.name, Some(&manifest.version))?;

        let key = Self::manifest_key(&manifest.name, &manifest.version);
        match self.storage.read(&key).await {
            Ok(_) => {
                return Err(CompkitError::AlreadyPublished {
                    name: manifest.name.clone(),
                    version: manifest.version.clone(),
                });
            }
            Err(CompkitError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let bytes = serde_json::to_vec_pretty(manifest).map_err(|e| CompkitError::Other {
            message: format!("Failed to serialize manifest {}: {e}", manifest.reference()),
        })?;
        debug!("Publishing {} to {}", manifest.reference(), self.location);
        self.storage.write(&key, &bytes).await
    }
}

#[async_trait]
impl<S: StorageProvider> RegistrySource for StorageRegistry<S> {
    async fn fetch_manifest(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<ComponentManifest> {
        let version = match version {
            Some(v) => v.to_string(),
            None => {
                let versions = self.list_versions(name).await?;
                latest_version(&versions).map(str::to_string).ok_or_else(|| {
                    CompkitError::NotFound {
                        name: name.to_string(),
                        version: None,
                    }
                })?
            }
        };

        let bytes = self.storage.read(&Self::manifest_key(name, &version)).await.map_err(|e| {
            match e {
                CompkitError::NotFound { .. } => CompkitError::NotFound {
                    name: name.to_string(),
                    version: Some(version.clone()),
                },
                other => other,
            }
        })?;

        let manifest: ComponentManifest =
            serde_json::from_slice(&bytes).map_err(|e| CompkitError::InvalidManifest {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        manifest.validate(name, Some(&version))?;
        Ok(manifest)
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        let prefix = format!("{COMPONENTS_PREFIX}{name}/");
        let mut versions: Vec<String> = self
            .storage
            .list(&prefix)
            .await?
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .filter_map(|rest| rest.strip_suffix(MANIFEST_EXTENSION))
            .map(str::to_string)
            .collect();

        if versions.is_empty() {
            return Err(CompkitError::NotFound {
                name: name.to_string(),
                version: None,
            });
        }
        sort_versions(&mut versions);
        Ok(versions)
    }

    async fn list_components(&self) -> Result<Vec<ComponentSummary>> {
        let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in self.storage.list(COMPONENTS_PREFIX).await? {
            let Some(rest) = key.strip_prefix(COMPONENTS_PREFIX) else {
                continue;
            };
            // Scoped names contain one extra '/'
            let Some((name, file)) = rest.rsplit_once('/') else {
                continue;
            };
            if let Some(version) = file.strip_suffix(MANIFEST_EXTENSION) {
                by_name.entry(name.to_string()).or_default().push(version.to_string());
            }
        }

        Ok(by_name
            .into_iter()
            .map(|(name, versions)| ComponentSummary {
                latest: latest_version(&versions).map(str::to_string),
                name,
                description: None,
            })
            .collect())
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentFile, FileKind, ManifestDependencies};
    use crate::storage::MemoryStorage;

    fn manifest(name: &str, version: &str) -> ComponentManifest {
        ComponentManifest {
            name: name.into(),
            version: version.into(),
            files: vec![ComponentFile {
                path: format!("ui/{name}.tsx"),
                content: "export {}".into(),
                kind: FileKind::Component,
            }],
            dependencies: ManifestDependencies::default(),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_publish_and_fetch_latest() -> Result<()> {
        let registry = StorageRegistry::new(MemoryStorage::new(), "memory");
        registry.publish(&manifest("button", "1.0.0")).await?;
        registry.publish(&manifest("button", "1.10.0")).await?;
        registry.publish(&manifest("button", "1.9.0")).await?;
        registry.publish(&manifest("@acme/card", "0.1.0")).await?;

        assert_eq!(registry.fetch_manifest("button", None).await?.version, "1.10.0");
        assert_eq!(registry.list_versions("button").await?, vec!["1.0.0", "1.9.0", "1.10.0"]);

        let listing = registry.list_components().await?;
        let names: Vec<_> = listing.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["@acme/card", "button"]);
        assert_eq!(listing[1].latest.as_deref(), Some("1.10.0"));
        Ok(())
    }

    #[tokio::test]
    async fn test_published_versions_are_immutable() -> Result<()> {
        let registry = StorageRegistry::new(MemoryStorage::new(), "memory");
        registry.publish(&manifest("button", "1.0.0")).await?;
        let err = registry.publish(&manifest("button", "1.0.0")).await.unwrap_err();
        assert!(matches!(err, CompkitError::AlreadyPublished { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_component_and_version() -> Result<()> {
        let registry = StorageRegistry::new(MemoryStorage::new(), "memory");
        registry.publish(&manifest("button", "1.0.0")).await?;

        let err = registry.fetch_manifest("card", None).await.unwrap_err();
        assert!(matches!(err, CompkitError::NotFound { version: None, .. }));

        let err = registry.fetch_manifest("button", Some("2.0.0")).await.unwrap_err();
        assert_eq!(
            err,
            CompkitError::NotFound {
                name: "button".into(),
                version: Some("2.0.0".into())
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_invalid() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.write("components/button/1.0.0.json", b"{\"name\": 3}").await?;
        let registry = StorageRegistry::new(storage, "memory");
        let err = registry.fetch_manifest("button", Some("1.0.0")).await.unwrap_err();
        assert!(matches!(err, CompkitError::InvalidManifest { .. }));
        Ok(())
    }
}
