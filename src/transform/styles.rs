//! Stylesheet and class-name helper references.

use std::path::{Path, PathBuf};

use regex::Regex;

use super::{
    ImportDecl, ImportKind, Language, SourceModule, StyleStrategy, TransformContext, Transformer,
    normalize_path, relative_specifier,
};
use crate::core::{CompkitError, Result};

const STYLESHEET_EXTENSIONS: &[&str] = &[".css", ".scss", ".sass", ".less"];

/// Points stylesheet imports at the files the project will actually have, following
/// [`TransformContext::style_strategy`], and routes class-name helper imports to
/// [`TransformContext::class_helper`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleReferenceTransformer;

impl Transformer for StyleReferenceTransformer {
    fn name(&self) -> &'static str {
        "style-reference"
    }

    fn transform(&self, mut module: SourceModule, ctx: &TransformContext) -> Result<SourceModule> {
        rewrite_stylesheet_imports(&mut module, ctx)?;
        if module.is_script() {
            rewrite_class_helper(&mut module, ctx)?;
        }
        Ok(module)
    }
}

fn is_stylesheet_specifier(specifier: &str) -> bool {
    let path = specifier.split(['?', '#']).next().unwrap_or(specifier);
    STYLESHEET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Whether `import` refers to a file of the component rather than a package or URL.
fn is_local(import: &ImportDecl, stylesheet_module: bool) -> bool {
    if stylesheet_module {
        let s = import.specifier.as_str();
        !s.contains(':') && !s.starts_with(['~', '@', '/'])
    } else {
        import.is_relative()
    }
}

fn reference_error(module: &SourceModule, reference: &str, reason: &str) -> CompkitError {
    CompkitError::StyleReferenceError {
        path: module.path.clone(),
        reference: reference.to_string(),
        reason: reason.to_string(),
    }
}

fn rewrite_stylesheet_imports(module: &mut SourceModule, ctx: &TransformContext) -> Result<()> {
    let stylesheet_module = module.language == Language::Stylesheet;
    let from = module.path.clone();
    let parent = from.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut unresolved: Option<(String, &'static str)> = None;
    let mut sheet_seen = false;

    for import in module.imports_mut() {
        if !is_stylesheet_specifier(&import.specifier) || !is_local(import, stylesheet_module) {
            continue;
        }
        let resolved: PathBuf = normalize_path(&parent.join(&import.specifier));
        let installed = ctx.installed_files.contains(&resolved);

        match &ctx.style_strategy {
            StyleStrategy::CoLocated => {
                if !installed {
                    unresolved = Some((import.specifier.clone(), "stylesheet is not part of this installation"));
                    break;
                }
                import.specifier = relative_specifier(&from, &resolved);
            }
            StyleStrategy::Global {
                sheet,
            } => {
                if stylesheet_module {
                    if !installed {
                        unresolved = Some((import.specifier.clone(), "stylesheet is not part of this installation"));
                        break;
                    }
                    // Merged into the shared sheet alongside this one.
                    import.removed = true;
                } else if installed || resolved == *sheet {
                    if sheet_seen {
                        import.removed = true;
                    } else {
                        import.specifier = relative_specifier(&from, sheet);
                        sheet_seen = true;
                    }
                } else {
                    unresolved = Some((import.specifier.clone(), "stylesheet is neither installed nor the global sheet"));
                    break;
                }
            }
        }
    }

    match unresolved {
        Some((reference, reason)) => Err(reference_error(module, &reference, reason)),
        None => Ok(()),
    }
}

fn rewrite_class_helper(module: &mut SourceModule, ctx: &TransformContext) -> Result<()> {
    let Some(helper) = &ctx.class_helper else {
        return Ok(());
    };

    let mut imported = false;
    for import in module.imports_mut() {
        if import.kind == ImportKind::Static && import.named_bindings().contains(&helper.name) {
            imported = true;
            if import.specifier != helper.module {
                import.specifier.clone_from(&helper.module);
            }
        }
    }
    if imported {
        return Ok(());
    }

    let name = regex::escape(&helper.name);
    let call = Regex::new(&format!(r"(^|[^.\w$]){name}\s*\(")).map_err(|e| CompkitError::Other {
        message: e.to_string(),
    })?;
    let definition = Regex::new(&format!(r"\b(?:function|const|let|var)\s+{name}\b"))
        .map_err(|e| CompkitError::Other {
            message: e.to_string(),
        })?;

    let code = module.code_text();
    if call.is_match(&code) && !definition.is_match(&code) {
        return Err(reference_error(
            module,
            &format!("{}()", helper.name),
            "class helper is called but never imported or defined",
        ));
    }
    Ok(())
}
