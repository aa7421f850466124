//! Project conventions every transformer reads.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::normalize_path;
use crate::core::{CompkitError, Result};
use crate::resolver::ResolutionResult;

/// One `prefix → replacement` import alias rule.
///
/// A replacement starting with `./` or `../` (or equal to `.`) names a directory relative
/// to the installation target; matching specifiers become relative paths from the
/// importing file. Any other replacement is substituted verbatim (another alias or a
/// package path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRule {
    /// Specifier prefix to match, at a path-segment boundary
    pub prefix: String,
    /// What the prefix becomes
    pub replacement: String,
}

impl AliasRule {
    /// Create a rule. Trailing slashes are ignored.
    pub fn new(prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let replacement = replacement.into();
        Self {
            prefix: trim_slash(&prefix).to_string(),
            replacement: trim_slash(&replacement).to_string(),
        }
    }

    /// The part of `specifier` after the prefix (empty or starting with `/`), when the
    /// rule matches.
    #[must_use]
    pub fn strip<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        under(&self.prefix, specifier)
    }

    /// Whether the replacement is a target-relative directory.
    #[must_use]
    pub fn is_target_relative(&self) -> bool {
        self.replacement == "."
            || self.replacement.starts_with("./")
            || self.replacement.starts_with("../")
    }

    /// Whether `specifier` is already in this rule's output form.
    #[must_use]
    pub fn produced(&self, specifier: &str) -> bool {
        !self.is_target_relative() && under(&self.replacement, specifier).is_some()
    }
}

impl FromStr for AliasRule {
    type Err = CompkitError;

    /// Parse `FROM=TO`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                Ok(Self::new(from.trim(), to.trim()))
            }
            _ => Err(CompkitError::Other {
                message: format!("Invalid alias '{s}', expected FROM=TO"),
            }),
        }
    }
}

fn trim_slash(s: &str) -> &str {
    if s.len() > 1 { s.trim_end_matches('/') } else { s }
}

/// `specifier` with `base` removed, when `specifier` equals `base` or continues it with `/`.
fn under<'s>(base: &str, specifier: &'s str) -> Option<&'s str> {
    let rest = specifier.strip_prefix(base)?;
    (rest.is_empty() || rest.starts_with('/') || base.ends_with('/')).then_some(rest)
}

/// Where component stylesheets end up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StyleStrategy {
    /// Each component keeps its own stylesheet next to its source
    #[default]
    CoLocated,
    /// Component stylesheets merge into one shared sheet
    Global {
        /// Shared sheet, relative to the installation target
        sheet: PathBuf,
    },
}

impl FromStr for StyleStrategy {
    type Err = CompkitError;

    /// Parse `co-located` or `global=<path>`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "co-located" | "colocated" => Ok(Self::CoLocated),
            other => match other.strip_prefix("global=") {
                Some(sheet) if !sheet.is_empty() => Ok(Self::Global {
                    sheet: normalize_path(Path::new(sheet)),
                }),
                _ => Err(CompkitError::Other {
                    message: format!("Invalid style strategy '{s}', expected co-located or global=<path>"),
                }),
            },
        }
    }
}

impl fmt::Display for StyleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoLocated => f.write_str("co-located"),
            Self::Global {
                sheet,
            } => write!(f, "global={}", sheet.display()),
        }
    }
}

/// The class-name helper components call (`cn(...)`) and the module that provides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHelper {
    /// Function name
    pub name: String,
    /// Module specifier to import it from
    pub module: String,
}

impl FromStr for ClassHelper {
    type Err = CompkitError;

    /// Parse `NAME=MODULE`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((name, module)) if !name.trim().is_empty() && !module.trim().is_empty() => {
                Ok(Self {
                    name: name.trim().to_string(),
                    module: module.trim().to_string(),
                })
            }
            _ => Err(CompkitError::Other {
                message: format!("Invalid class helper '{s}', expected NAME=MODULE"),
            }),
        }
    }
}

/// Shared, read-only input of every transformer.
///
/// The caller supplies the project conventions; [`TransformContext::for_resolution`] adds
/// what is known about the components being installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformContext {
    /// Ordered alias rules
    pub alias_map: Vec<AliasRule>,
    /// Stylesheet handling
    pub style_strategy: StyleStrategy,
    /// Whether the project uses TypeScript
    pub typescript: bool,
    /// Class-name helper, when the project has one
    pub class_helper: Option<ClassHelper>,
    /// Resolved components: name → entry file (output path, target-relative)
    pub component_entries: BTreeMap<String, PathBuf>,
    /// Third-party package names
    pub packages: BTreeSet<String>,
    /// Every output path written by this operation, target-relative
    pub installed_files: BTreeSet<PathBuf>,
}

impl TransformContext {
    /// A TypeScript project with co-located styles and no aliases.
    ///
    /// Paths are target-relative throughout; where the target lives is an installer
    /// concern ([`InstallOptions::target_dir`](crate::installer::InstallOptions)).
    #[must_use]
    pub fn new() -> Self {
        Self {
            alias_map: Vec::new(),
            style_strategy: StyleStrategy::CoLocated,
            typescript: true,
            class_helper: None,
            component_entries: BTreeMap::new(),
            packages: BTreeSet::new(),
            installed_files: BTreeSet::new(),
        }
    }

    /// Append an alias rule.
    #[must_use]
    pub fn with_alias(mut self, rule: AliasRule) -> Self {
        self.alias_map.push(rule);
        self
    }

    /// Set the style strategy.
    #[must_use]
    pub fn with_style_strategy(mut self, strategy: StyleStrategy) -> Self {
        self.style_strategy = strategy;
        self
    }

    /// Set whether the project uses TypeScript.
    #[must_use]
    pub fn with_typescript(mut self, typescript: bool) -> Self {
        self.typescript = typescript;
        self
    }

    /// Set the class-name helper.
    #[must_use]
    pub fn with_class_helper(mut self, helper: ClassHelper) -> Self {
        self.class_helper = Some(helper);
        self
    }

    /// Where a manifest file path is written in this project.
    ///
    /// TypeScript sources become JavaScript when the project does not use TypeScript;
    /// declaration files keep their name.
    #[must_use]
    pub fn output_path(&self, path: &Path) -> PathBuf {
        let path = normalize_path(path);
        if self.typescript || path.to_string_lossy().ends_with(".d.ts") {
            return path;
        }
        match path.extension().and_then(|e| e.to_str()).and_then(script_extension) {
            Some(ext) => path.with_extension(ext),
            None => path,
        }
    }

    /// This context extended with the components, packages and files of `resolution`.
    #[must_use]
    pub fn for_resolution(&self, resolution: &ResolutionResult) -> Self {
        let mut ctx = self.clone();
        for manifest in resolution.manifests() {
            if let Some(entry) = manifest.entry_file() {
                ctx.component_entries
                    .insert(manifest.name.clone(), ctx.output_path(Path::new(&entry.path)));
            }
            for file in &manifest.files {
                ctx.installed_files.insert(ctx.output_path(Path::new(&file.path)));
            }
        }
        ctx.packages.extend(resolution.npm_packages.keys().cloned());
        ctx
    }
}

impl Default for TransformContext {
    fn default() -> Self {
        Self::new()
    }
}

/// JavaScript extension for a TypeScript one.
pub(crate) fn script_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "ts" => Some("js"),
        "tsx" => Some("jsx"),
        "mts" => Some("mjs"),
        "cts" => Some("cjs"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_rule_matches_at_segment_boundary() {
        let rule = AliasRule::new("@/registry/ui/", "@/components/ui");
        assert_eq!(rule.prefix, "@/registry/ui");
        assert_eq!(rule.strip("@/registry/ui/button"), Some("/button"));
        assert_eq!(rule.strip("@/registry/ui"), Some(""));
        assert_eq!(rule.strip("@/registry/uikit"), None);
        assert!(rule.produced("@/components/ui/button"));
        assert!(!rule.is_target_relative());
        assert!(AliasRule::new("@/lib", "./lib").is_target_relative());
    }

    #[test]
    fn test_parse_cli_values() {
        let rule: AliasRule = "@/ui=./components/ui".parse().unwrap();
        assert_eq!(rule, AliasRule::new("@/ui", "./components/ui"));
        assert!("nope".parse::<AliasRule>().is_err());

        assert_eq!("co-located".parse::<StyleStrategy>().unwrap(), StyleStrategy::CoLocated);
        assert_eq!(
            "global=styles/./globals.css".parse::<StyleStrategy>().unwrap(),
            StyleStrategy::Global {
                sheet: PathBuf::from("styles/globals.css")
            }
        );
        assert!("global=".parse::<StyleStrategy>().is_err());

        let helper: ClassHelper = "cn=@/lib/utils".parse().unwrap();
        assert_eq!(helper.name, "cn");
        assert_eq!(helper.module, "@/lib/utils");
    }

    #[test]
    fn test_output_path_for_javascript_projects() {
        let ts = TransformContext::new();
        assert_eq!(ts.output_path(Path::new("ui/button.tsx")), PathBuf::from("ui/button.tsx"));

        let js = TransformContext::new().with_typescript(false);
        assert_eq!(js.output_path(Path::new("ui/button.tsx")), PathBuf::from("ui/button.jsx"));
        assert_eq!(js.output_path(Path::new("lib/utils.ts")), PathBuf::from("lib/utils.js"));
        assert_eq!(js.output_path(Path::new("types.d.ts")), PathBuf::from("types.d.ts"));
        assert_eq!(js.output_path(Path::new("ui/button.css")), PathBuf::from("ui/button.css"));
    }
}
