//! Import-path rewriting and dependency-identifier substitution.

use std::path::Path;

use super::{
    SourceModule, TransformContext, Transformer, normalize_path, relative_specifier,
    strip_extension,
};
use crate::core::Result;

/// Rewrites alias-prefixed specifiers using [`TransformContext::alias_map`].
///
/// The longest matching prefix wins; among equally long prefixes the first rule wins.
/// Specifiers already in the output form of a verbatim rule are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportPathTransformer;

impl ImportPathTransformer {
    fn rewrite(specifier: &str, from: &Path, ctx: &TransformContext) -> Option<String> {
        if ctx.alias_map.iter().any(|rule| rule.produced(specifier)) {
            return None;
        }

        let mut best: Option<(&super::AliasRule, &str)> = None;
        for rule in &ctx.alias_map {
            if let Some(rest) = rule.strip(specifier)
                && best.is_none_or(|(b, _)| rule.prefix.len() > b.prefix.len())
            {
                best = Some((rule, rest));
            }
        }
        let (rule, rest) = best?;

        if rule.is_target_relative() {
            let target = normalize_path(Path::new(&format!("{}{rest}", rule.replacement)));
            Some(relative_specifier(from, &target))
        } else {
            Some(format!("{}{rest}", rule.replacement))
        }
    }
}

impl Transformer for ImportPathTransformer {
    fn name(&self) -> &'static str {
        "import-path"
    }

    fn transform(&self, mut module: SourceModule, ctx: &TransformContext) -> Result<SourceModule> {
        if ctx.alias_map.is_empty() {
            return Ok(module);
        }
        let from = module.path.clone();
        for import in module.imports_mut() {
            if let Some(rewritten) = Self::rewrite(&import.specifier, &from, ctx)
                && rewritten != import.specifier
            {
                tracing::trace!("{}: {} -> {rewritten}", from.display(), import.specifier);
                import.specifier = rewritten;
            }
        }
        Ok(module)
    }
}

/// Replaces bare imports of resolved registry components with a relative path to the
/// component's entry file.
///
/// Third-party packages are never substituted, even when a component shares their name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyIdentifierTransformer;

impl Transformer for DependencyIdentifierTransformer {
    fn name(&self) -> &'static str {
        "dependency-identifier"
    }

    fn transform(&self, mut module: SourceModule, ctx: &TransformContext) -> Result<SourceModule> {
        if !module.is_script() {
            return Ok(module);
        }
        let from = module.path.clone();
        for import in module.imports_mut() {
            if ctx.packages.contains(&import.specifier) {
                continue;
            }
            if let Some(entry) = ctx.component_entries.get(&import.specifier) {
                import.specifier = relative_specifier(&from, &strip_extension(entry));
            }
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::AliasRule;
    use std::path::PathBuf;

    fn run(transformer: &dyn Transformer, path: &str, source: &str, ctx: &TransformContext) -> String {
        let module = SourceModule::parse(path, source).unwrap();
        transformer.transform(module, ctx).unwrap().render()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let ctx = TransformContext::new()
            .with_alias(AliasRule::new("@/registry", "@/vendor"))
            .with_alias(AliasRule::new("@/registry/ui", "@/components/ui"))
            .with_alias(AliasRule::new("@/registry/ui", "@/ignored"));

        let out = run(
            &ImportPathTransformer,
            "ui/card.tsx",
            "import { Button } from '@/registry/ui/button'\nimport { x } from '@/registry/hooks/x'\nimport y from '@/registryish'\n",
            &ctx,
        );
        assert_eq!(
            out,
            "import { Button } from '@/components/ui/button'\nimport { x } from '@/vendor/hooks/x'\nimport y from '@/registryish'\n"
        );
    }

    #[test]
    fn test_target_relative_replacement() {
        let ctx = TransformContext::new()
            .with_alias(AliasRule::new("@/registry/ui", "./ui"))
            .with_alias(AliasRule::new("@/registry/lib", "./lib"));
        let out = run(
            &ImportPathTransformer,
            "ui/card.tsx",
            "import { cn } from \"@/registry/lib/utils\";\nconst Lazy = import(\"@/registry/ui/lazy\");\n",
            &ctx,
        );
        assert_eq!(
            out,
            "import { cn } from \"../lib/utils\";\nconst Lazy = import(\"./lazy\");\n"
        );
    }

    #[test]
    fn test_canonical_specifiers_are_untouched() {
        let ctx = TransformContext::new().with_alias(AliasRule::new("@/ui", "@/ui/components"));
        let source = "import { Button } from '@/ui/components/button'\n";
        assert_eq!(run(&ImportPathTransformer, "a.tsx", source, &ctx), source);

        let once = run(&ImportPathTransformer, "a.tsx", "import b from '@/ui/badge'\n", &ctx);
        assert_eq!(once, "import b from '@/ui/components/badge'\n");
        assert_eq!(run(&ImportPathTransformer, "a.tsx", &once, &ctx), once);
    }

    #[test]
    fn test_component_identifiers_become_relative_paths() {
        let mut ctx = TransformContext::new();
        ctx.component_entries.insert("button".into(), PathBuf::from("ui/button.tsx"));
        ctx.component_entries.insert("@acme/use-toggle".into(), PathBuf::from("hooks/use-toggle.ts"));
        ctx.component_entries.insert("clsx".into(), PathBuf::from("lib/clsx.ts"));
        ctx.packages.insert("clsx".into());

        let out = run(
            &DependencyIdentifierTransformer,
            "ui/dialog.tsx",
            "import { Button } from 'button'\nimport { useToggle } from '@acme/use-toggle'\nimport clsx from 'clsx'\nimport React from 'react'\n",
            &ctx,
        );
        assert_eq!(
            out,
            "import { Button } from './button'\nimport { useToggle } from '../hooks/use-toggle'\nimport clsx from 'clsx'\nimport React from 'react'\n"
        );
    }
}
