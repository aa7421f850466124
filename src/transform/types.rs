//! Type-only constructs for JavaScript projects.

use std::path::Path;

use super::annotations::strip_type_syntax;
use super::context::script_extension;
use super::parser::brace_span;
use super::{ImportDecl, ImportKind, SourceModule, TransformContext, Transformer};
use crate::core::Result;

/// Turns TypeScript sources into JavaScript when [`TransformContext::typescript`] is false:
/// type-only imports go, annotations and type declarations are stripped, and TypeScript
/// files and specifiers are renamed. A no-op for TypeScript projects.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeAnnotationTransformer;

impl Transformer for TypeAnnotationTransformer {
    fn name(&self) -> &'static str {
        "type-annotation"
    }

    fn transform(&self, mut module: SourceModule, ctx: &TransformContext) -> Result<SourceModule> {
        if ctx.typescript {
            return Ok(module);
        }
        if module.is_script() {
            for import in module.imports_mut() {
                if matches!(import.kind, ImportKind::Static | ImportKind::ReExport) {
                    strip_type_only(import);
                }
                if let Some(renamed) = javascript_specifier(&import.specifier) {
                    import.specifier = renamed;
                }
            }
            module = strip_type_syntax(module)?;
        }
        module.path = ctx.output_path(&module.path);
        Ok(module)
    }
}

fn strip_type_only(import: &mut ImportDecl) {
    if import.type_only {
        import.removed = true;
        return;
    }
    let Some((open, close)) = brace_span(&import.prefix) else {
        return;
    };

    let inner = &import.prefix[open + 1..close];
    let specifiers: Vec<&str> = inner.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let kept: Vec<&str> = specifiers.iter().copied().filter(|s| !is_type_specifier(s)).collect();
    if kept.len() == specifiers.len() {
        return;
    }

    let head = import.prefix[..open].trim_end();
    let tail = &import.prefix[close + 1..];
    if kept.is_empty() {
        match head.strip_suffix(',') {
            // `import Default, { type T } from` keeps the default binding
            Some(default) => import.prefix = format!("{}{tail}", default.trim_end()),
            None => import.removed = true,
        }
        return;
    }

    let pad = if inner.starts_with(char::is_whitespace) { " " } else { "" };
    import.prefix = format!(
        "{}{{{pad}{}{pad}}}{tail}",
        &import.prefix[..open],
        kept.join(", ")
    );
}

/// `type X` or `type X as Y`; a binding named `type` is not a type specifier.
fn is_type_specifier(specifier: &str) -> bool {
    specifier
        .strip_prefix("type")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace) && !rest.trim_start().starts_with("as "))
}

fn javascript_specifier(specifier: &str) -> Option<String> {
    if specifier.ends_with(".d.ts") || !(specifier.starts_with('.') || specifier.contains('/')) {
        return None;
    }
    let ext = Path::new(specifier).extension()?.to_str()?;
    let js = script_extension(ext)?;
    let stem = &specifier[..specifier.len() - ext.len()];
    Some(format!("{stem}{js}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn run(path: &str, source: &str, typescript: bool) -> SourceModule {
        let ctx = TransformContext::new().with_typescript(typescript);
        let module = SourceModule::parse(path, source).unwrap();
        TypeAnnotationTransformer.transform(module, &ctx).unwrap()
    }

    #[test]
    fn test_typescript_projects_are_untouched() {
        let source = "import type { A } from './a'\nexport const x: A = 1\n";
        let module = run("x.ts", source, true);
        assert_eq!(module.render(), source);
        assert_eq!(module.path, PathBuf::from("x.ts"));
    }

    #[test]
    fn test_type_only_imports_and_exports_are_removed() {
        let module = run(
            "ui/x.tsx",
            "import type { A } from './a'\nexport type { B } from './b'\nimport { useState } from 'react'\n",
            false,
        );
        assert_eq!(module.render(), "import { useState } from 'react'\n");
        assert_eq!(module.path, PathBuf::from("ui/x.jsx"));
    }

    #[test]
    fn test_type_specifiers_are_stripped() {
        let module = run(
            "x.ts",
            "import { cn, type ClassValue } from './utils'\nimport Def, { type T } from './d'\nimport {type Only} from './o'\nimport { type } from './kw'\n",
            false,
        );
        assert_eq!(
            module.render(),
            "import { cn } from './utils'\nimport Def from './d'\nimport { type } from './kw'\n"
        );
    }

    #[test]
    fn test_typescript_specifiers_are_renamed() {
        let module = run(
            "x.ts",
            "import a from './a.ts'\nimport b from './b.tsx'\nimport c from './c.d.ts'\nimport d from 'pkg.ts'\n",
            false,
        );
        assert_eq!(
            module.render(),
            "import a from './a.js'\nimport b from './b.jsx'\nimport c from './c.d.ts'\nimport d from 'pkg.ts'\n"
        );
    }

    #[test]
    fn test_annotations_are_stripped_for_javascript_output() {
        let module = run(
            "ui/button.tsx",
            "import type { Props } from './types'\ninterface Local { a: string }\nexport function Button({ a }: Props): JSX.Element {\n  const n: number = 1\n  return <b>{a as string}</b>\n}\n",
            false,
        );
        assert_eq!(
            module.render(),
            "export function Button({ a }) {\n  const n = 1\n  return <b>{a}</b>\n}\n"
        );
        assert_eq!(module.path, PathBuf::from("ui/button.jsx"));
    }

    #[test]
    fn test_enum_fails_the_javascript_transform() {
        let ctx = TransformContext::new().with_typescript(false);
        let module = SourceModule::parse("lib/color.ts", "export enum Color { Red }\n").unwrap();
        let err = TypeAnnotationTransformer.transform(module, &ctx).unwrap_err();
        assert!(matches!(err, crate::core::CompkitError::ParseError { line: 1, .. }));
    }
}
