//! Shared data models for registry components
//!
//! These types mirror the JSON the registry serves (camelCase field names) and are used by
//! every stage of the pipeline. A [`ComponentManifest`] is immutable once published: a new
//! version is a new manifest.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use crate::core::{CompkitError, Result};

/// Version string meaning "the greatest published version".
pub const LATEST: &str = "latest";

fn latest() -> String {
    LATEST.to_string()
}

/// Identifies a published artifact: `name@version`.
///
/// Dependency declarations may use [`LATEST`] (or omit the version) to accept whatever
/// version the resolver chooses. Once resolved, a reference always carries a concrete
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentRef {
    /// Component name as published in the registry
    pub name: String,
    /// Exact version, or [`LATEST`]
    #[serde(default = "latest")]
    pub version: String,
}

impl ComponentRef {
    /// Create a reference to an exact version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Create a reference to the latest version.
    pub fn latest(name: impl Into<String>) -> Self {
        Self::new(name, LATEST)
    }

    /// Whether this reference asks for the latest version rather than a pinned one.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.version.is_empty() || self.version == LATEST
    }

    /// The pinned version, `None` for latest.
    #[must_use]
    pub fn pinned(&self) -> Option<&str> {
        if self.is_latest() { None } else { Some(&self.version) }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for ComponentRef {
    type Err = CompkitError;

    /// Parse `name` or `name@version`. Scoped names (`@scope/name@1.0.0`) keep their
    /// leading `@`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split_at = s.char_indices().skip(1).filter(|&(_, c)| c == '@').map(|(i, _)| i).last();
        let (name, version) = match split_at {
            Some(i) => (&s[..i], &s[i + 1..]),
            None => (s, LATEST),
        };
        if name.is_empty() || version.is_empty() {
            return Err(CompkitError::Other {
                message: format!("Invalid component reference '{s}', expected NAME[@VERSION]"),
            });
        }
        Ok(Self::new(name, version))
    }
}

/// What role a file plays inside a component bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// The component's UI source; the first one is the component's entry point
    #[default]
    Component,
    /// Shared library code
    Lib,
    /// Hook or composable
    Hook,
    /// Stylesheet
    Style,
    /// Static asset copied verbatim
    Asset,
    /// Any kind this client does not know about
    #[serde(other)]
    Other,
}

/// One file of a component bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFile {
    /// Relative path of the file within the installation target
    pub path: String,
    /// File content
    pub content: String,
    /// Role of the file
    #[serde(default)]
    pub kind: FileKind,
}

/// Dependencies declared by a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDependencies {
    /// Other registry components, in declaration order
    #[serde(default)]
    pub components: Vec<ComponentRef>,
    /// Third-party packages: name → version range
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
}

/// Registry-side record describing one published component version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentManifest {
    /// Component name
    pub name: String,
    /// Published version
    pub version: String,
    /// Source files
    pub files: Vec<ComponentFile>,
    /// Declared dependencies
    #[serde(default)]
    pub dependencies: ManifestDependencies,
    /// Free-form metadata (description, authors, ...)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl ComponentManifest {
    /// Reference to this exact manifest.
    #[must_use]
    pub fn reference(&self) -> ComponentRef {
        ComponentRef::new(&self.name, &self.version)
    }

    /// The file other components import when they depend on this one.
    ///
    /// The first [`FileKind::Component`] file, falling back to the first file.
    #[must_use]
    pub fn entry_file(&self) -> Option<&ComponentFile> {
        self.files.iter().find(|f| f.kind == FileKind::Component).or_else(|| self.files.first())
    }

    /// Check the manifest against the request it was fetched for.
    ///
    /// # Errors
    ///
    /// Returns [`CompkitError::InvalidManifest`] when the name or pinned version does not
    /// match, the bundle is empty, a file path escapes the target directory or is
    /// duplicated, or a package range is blank.
    pub fn validate(&self, expected_name: &str, expected_version: Option<&str>) -> Result<()> {
        let invalid = |reason: String| CompkitError::InvalidManifest {
            name: expected_name.to_string(),
            reason,
        };

        if self.name != expected_name {
            return Err(invalid(format!("manifest is for '{}'", self.name)));
        }
        if let Some(version) = expected_version
            && version != self.version
        {
            return Err(invalid(format!(
                "requested version {version} but manifest is {}",
                self.version
            )));
        }
        if self.version.trim().is_empty() {
            return Err(invalid("version is empty".to_string()));
        }
        if self.files.is_empty() {
            return Err(invalid("manifest lists no files".to_string()));
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            validate_file_path(&file.path).map_err(invalid)?;
            if !seen.insert(file.path.as_str()) {
                return Err(invalid(format!("file '{}' is listed twice", file.path)));
            }
        }

        for dep in &self.dependencies.components {
            if dep.name.trim().is_empty() {
                return Err(invalid("component dependency with empty name".to_string()));
            }
        }
        for (package, range) in &self.dependencies.packages {
            if package.trim().is_empty() || range.trim().is_empty() {
                return Err(invalid(format!("package '{package}' has an empty name or range")));
            }
        }

        Ok(())
    }
}

/// Manifest file paths must stay inside the installation target.
fn validate_file_path(path: &str) -> std::result::Result<(), String> {
    if path.trim().is_empty() {
        return Err("file with empty path".to_string());
    }
    let p = Path::new(path);
    for component in p.components() {
        match component {
            Component::ParentDir => {
                return Err(format!("file path '{path}' contains a parent directory reference"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("file path '{path}' is absolute"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Entry in the registry's component listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    /// Component name
    pub name: String,
    /// Latest published version, if the registry reports one
    #[serde(default)]
    pub latest: Option<String>,
    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response of `GET /components/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentVersions {
    /// Component name
    pub name: String,
    /// Version the registry calls latest
    #[serde(default)]
    pub latest: Option<String>,
    /// Every published version
    #[serde(default)]
    pub versions: Vec<String>,
}

/// One page of `GET /components`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPage {
    /// Components on this page
    #[serde(default)]
    pub items: Vec<ComponentSummary>,
    /// Next page number, absent on the last page
    #[serde(default)]
    pub next_page: Option<u32>,
}
