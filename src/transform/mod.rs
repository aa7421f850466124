//! Source rewriting for installed components.
//!
//! Fetched files are parsed into a [`SourceModule`] and passed through an ordered chain of
//! [`Transformer`]s that share one read-only [`TransformContext`]. The built-in chain is:
//!
//! 1. [`ImportPathTransformer`] - alias prefixes become project paths
//! 2. [`StyleReferenceTransformer`] - stylesheet imports and class-name helper imports
//!    follow the project's [`StyleStrategy`]
//! 3. [`DependencyIdentifierTransformer`] - bare imports of other resolved components
//!    become relative paths
//! 4. [`TypeAnnotationTransformer`] - type-only imports, annotations and declarations
//!    are dropped for JavaScript projects
//!
//! Later transformers rely on earlier ones having put specifiers into canonical form.
//! Every transformer leaves canonical input untouched, so running the pipeline on its own
//! output yields the same bytes.
//!
//! # Example
//!
//! ```rust,no_run
//! use compkit_cli::transform::{AliasRule, TransformContext, TransformPipeline};
//! use std::path::Path;
//!
//! let ctx = TransformContext::new()
//!     .with_alias(AliasRule::new("@/registry/ui", "./ui"));
//! let out = TransformPipeline::new()
//!     .transform_file(Path::new("ui/dialog.tsx"), "import { Button } from '@/registry/ui/button'\n", &ctx)
//!     .unwrap();
//! assert_eq!(out.content, "import { Button } from './button'\n");
//! ```

mod annotations;
mod context;
mod imports;
mod parser;
mod styles;
mod types;

pub use context::{AliasRule, ClassHelper, StyleStrategy, TransformContext};
pub use imports::{DependencyIdentifierTransformer, ImportPathTransformer};
pub use parser::{ImportDecl, ImportKind, Item, Language, SourceModule};
pub use styles::StyleReferenceTransformer;
pub use types::TypeAnnotationTransformer;

use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::core::Result;

/// One rewriting step.
///
/// Implementations must be no-ops on input already in their output form.
pub trait Transformer: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Rewrite `module`.
    ///
    /// # Errors
    ///
    /// Transform-tier errors such as [`crate::core::CompkitError::StyleReferenceError`].
    fn transform(&self, module: SourceModule, ctx: &TransformContext) -> Result<SourceModule>;
}

/// A transformed file ready to be staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedFile {
    /// Output path, relative to the installation target
    pub path: PathBuf,
    /// Rewritten content
    pub content: String,
}

/// Ordered chain of transformers.
pub struct TransformPipeline {
    transformers: Vec<Box<dyn Transformer>>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformPipeline {
    /// The built-in chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transformers: vec![
                Box::new(ImportPathTransformer),
                Box::new(StyleReferenceTransformer),
                Box::new(DependencyIdentifierTransformer),
                Box::new(TypeAnnotationTransformer),
            ],
        }
    }

    /// Append a transformer after the existing ones.
    #[must_use]
    pub fn with_transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    /// Transformer names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    /// Run every transformer over `module`.
    ///
    /// # Errors
    ///
    /// The first transformer error.
    pub fn run(&self, module: SourceModule, ctx: &TransformContext) -> Result<SourceModule> {
        self.transformers.iter().try_fold(module, |module, transformer| {
            debug!("{} on {}", transformer.name(), module.path.display());
            transformer.transform(module, ctx)
        })
    }

    /// Parse, transform and render one file.
    ///
    /// # Errors
    ///
    /// [`crate::core::CompkitError::ParseError`] for malformed sources; transformer errors.
    pub fn transform_file(
        &self,
        path: &Path,
        content: &str,
        ctx: &TransformContext,
    ) -> Result<TransformedFile> {
        let module = SourceModule::parse(normalize_path(path), content)?;
        let module = self.run(module, ctx)?;
        Ok(TransformedFile {
            content: module.render(),
            path: module.path,
        })
    }
}

/// Resolve `.` and `..` lexically.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Import specifier (`./x` or `../x`, `/`-separated) that reaches `target` from the file
/// `from`. Both paths are relative to the same root.
#[must_use]
pub fn relative_specifier(from: &Path, target: &Path) -> String {
    let from_dir = normalize_path(from.parent().unwrap_or_else(|| Path::new("")));
    let target = normalize_path(target);
    let from_parts: Vec<_> = from_dir.components().collect();
    let target_parts: Vec<_> = target.components().collect();

    let common = from_parts.iter().zip(&target_parts).take_while(|(a, b)| a == b).count();
    let ups = from_parts.len() - common;
    let rest: Vec<String> = target_parts[common..]
        .iter()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let mut specifier = if ups == 0 { "./".to_string() } else { "../".repeat(ups) };
    specifier.push_str(&rest.join("/"));
    specifier
}

/// `path` without its final extension.
pub(crate) fn strip_extension(path: &Path) -> PathBuf {
    path.with_extension("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompkitError;

    #[test]
    fn test_relative_specifier() {
        let cases = [
            ("ui/dialog.tsx", "ui/button", "./button"),
            ("ui/dialog.tsx", "lib/utils", "../lib/utils"),
            ("index.ts", "ui/button", "./ui/button"),
            ("a/b/c.ts", "x.css", "../../x.css"),
            ("ui/dialog.tsx", "ui/./nested/../button.css", "./button.css"),
        ];
        for (from, target, expected) in cases {
            assert_eq!(relative_specifier(Path::new(from), Path::new(target)), expected, "{from} -> {target}");
        }
    }

    #[test]
    fn test_normalize_path_keeps_leading_parents() {
        assert_eq!(normalize_path(Path::new("../a/./b/../c")), PathBuf::from("../a/c"));
    }

    struct Banner;

    impl Transformer for Banner {
        fn name(&self) -> &'static str {
            "banner"
        }

        fn transform(&self, mut module: SourceModule, _ctx: &TransformContext) -> Result<SourceModule> {
            let banner = "// generated\n";
            if matches!(module.items.first(), Some(Item::Code(code)) if code.starts_with(banner)) {
                return Ok(module);
            }
            module.items.insert(0, Item::Code(banner.to_string()));
            Ok(module)
        }
    }

    #[test]
    fn test_custom_transformers_run_last() {
        let pipeline = TransformPipeline::new().with_transformer(Banner);
        assert_eq!(
            pipeline.names(),
            vec!["import-path", "style-reference", "dependency-identifier", "type-annotation", "banner"]
        );

        let ctx = TransformContext::new();
        let once = pipeline.transform_file(Path::new("a.ts"), "export const a = 1;\n", &ctx).unwrap();
        assert_eq!(once.content, "// generated\nexport const a = 1;\n");
        let twice = pipeline.transform_file(&once.path, &once.content, &ctx).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_full_pipeline_is_idempotent() {
        let ctx = TransformContext::new()
            .with_alias(AliasRule::new("@/registry/ui", "./ui"))
            .with_alias(AliasRule::new("@/registry/lib", "@/lib"))
            .with_class_helper("cn=@/lib/utils".parse().unwrap())
            .with_typescript(false);
        let mut ctx = ctx;
        ctx.installed_files.insert(PathBuf::from("ui/dialog.css"));
        ctx.component_entries.insert("button".into(), PathBuf::from("ui/button.jsx"));
        ctx.packages.insert("react".into());

        let source = r#"import * as React from "react"
import type { ReactNode } from "react"
import { cn, type ClassValue } from "@/registry/lib/utils"
import { Button } from "button"
import { Overlay } from "@/registry/ui/overlay.tsx"
import "./dialog.css"

export function Dialog({ children }: { children: ReactNode }) {
  return <div className={cn("dialog")}><Button /><Overlay />{children}</div>
}
"#;
        let pipeline = TransformPipeline::new();
        let once = pipeline.transform_file(Path::new("ui/dialog.tsx"), source, &ctx).unwrap();
        assert_eq!(once.path, PathBuf::from("ui/dialog.jsx"));
        assert_eq!(
            once.content,
            r#"import * as React from "react"
import { cn } from "@/lib/utils"
import { Button } from "./button"
import { Overlay } from "./overlay.jsx"
import "./dialog.css"

export function Dialog({ children }) {
  return <div className={cn("dialog")}><Button /><Overlay />{children}</div>
}
"#
        );

        let twice = pipeline.transform_file(&once.path, &once.content, &ctx).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_parse_errors_stop_the_pipeline() {
        let ctx = TransformContext::new();
        let err = TransformPipeline::new()
            .transform_file(Path::new("ui/broken.tsx"), "export const a = (\n", &ctx)
            .unwrap_err();
        assert!(matches!(err, CompkitError::ParseError { ref path, .. } if path == Path::new("ui/broken.tsx")));
    }
}
