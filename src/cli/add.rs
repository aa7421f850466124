//! Install a component and its dependency closure into the project.
//!
//! The command runs the whole pipeline: resolve against the registry, transform every
//! fetched file with the project conventions given on the command line, then install
//! all-or-nothing. Pressing Ctrl-C cancels the pipeline; any staged files are rolled back.
//!
//! # Examples
//!
//! ```bash
//! # Latest version into ./components
//! compkit add dialog --registry ./registry
//!
//! # Pinned version, JavaScript project, aliases rewritten to relative paths
//! compkit add dialog --version 2.1.0 --js --alias @/registry/ui=./ui --alias @/registry/lib=./lib
//!
//! # Shared stylesheet and package.json merge
//! compkit add card --style global=styles/globals.css --package-json package.json
//! ```

use std::cell::Cell;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::debug;

use crate::constants::{DEFAULT_REGISTRY_URL, default_max_parallel};
use crate::core::{CompkitError, PipelineStage};
use crate::installer::{FileStatus, InstallOptions, InstallReport, Installer};
use crate::models::ComponentRef;
use crate::registry::open_registry;
use crate::resolver::{ConflictPolicy, DependencyResolver, ResolutionResult};
use crate::transform::{AliasRule, ClassHelper, StyleStrategy, TransformContext};

/// Arguments of `compkit add`.
#[derive(Args, Debug)]
pub struct AddCommand {
    /// Component to install (`name` or `name@version`)
    component: String,

    /// Version to install instead of the latest
    #[arg(long = "version", value_name = "VERSION")]
    pin: Option<String>,

    /// Registry URL or directory
    #[arg(long, env = "COMPKIT_REGISTRY", default_value = DEFAULT_REGISTRY_URL)]
    registry: String,

    /// Directory to install component files into
    #[arg(long = "to", value_name = "PATH", default_value = "components")]
    target_dir: PathBuf,

    /// Overwrite existing files that differ
    #[arg(short, long)]
    force: bool,

    /// Resolve and transform, but write nothing
    #[arg(long)]
    dry_run: bool,

    /// The project uses JavaScript; drop type-only syntax and write .js/.jsx files
    #[arg(long)]
    js: bool,

    /// Import alias rule `FROM=TO`; repeatable, longest FROM wins
    #[arg(long = "alias", value_name = "FROM=TO")]
    aliases: Vec<AliasRule>,

    /// Stylesheet handling: `co-located` or `global=<path>`
    #[arg(long, value_name = "STRATEGY", default_value = "co-located")]
    style: StyleStrategy,

    /// Class-name helper `NAME=MODULE`, e.g. `cn=@/lib/utils`
    #[arg(long, value_name = "NAME=MODULE")]
    class_helper: Option<ClassHelper>,

    /// package.json to merge third-party packages into
    #[arg(long, value_name = "PATH")]
    package_json: Option<PathBuf>,

    /// Maximum concurrent fetches and transforms
    #[arg(long, value_name = "NUM", env = "COMPKIT_MAX_PARALLEL")]
    max_parallel: Option<usize>,

    /// Fail when two components pin different versions of one dependency
    #[arg(long)]
    strict_versions: bool,
}

impl AddCommand {
    fn root(&self) -> Result<ComponentRef, CompkitError> {
        let mut root: ComponentRef = self.component.parse()?;
        if let Some(version) = &self.pin {
            root.version.clone_from(version);
        }
        Ok(root)
    }

    fn transform_context(&self) -> TransformContext {
        let mut ctx = TransformContext::new()
            .with_style_strategy(self.style.clone())
            .with_typescript(!self.js);
        for rule in &self.aliases {
            ctx = ctx.with_alias(rule.clone());
        }
        if let Some(helper) = &self.class_helper {
            ctx = ctx.with_class_helper(helper.clone());
        }
        ctx
    }

    fn install_options(&self, max_parallel: usize) -> InstallOptions {
        let options = InstallOptions::new(&self.target_dir)
            .with_force(self.force)
            .with_dry_run(self.dry_run)
            .with_max_parallel(max_parallel);
        match &self.package_json {
            Some(path) => options.with_package_json(path),
            None => options,
        }
    }

    /// Run the command.
    ///
    /// # Errors
    ///
    /// The first pipeline failure, or [`CompkitError::Cancelled`] on Ctrl-C.
    pub async fn execute(self, quiet: bool) -> Result<()> {
        let root = self.root()?;
        let max_parallel = self.max_parallel.unwrap_or_else(default_max_parallel).max(1);
        let policy = if self.strict_versions {
            ConflictPolicy::Strict
        } else {
            ConflictPolicy::FirstResolved
        };

        let registry = open_registry(&self.registry)?;
        debug!("Installing {root} from {}", registry.location());
        let resolver = DependencyResolver::new(registry)
            .with_max_parallel(max_parallel)
            .with_policy(policy);
        let ctx = self.transform_context();
        let options = self.install_options(max_parallel);
        let installer = Installer::new();

        let stage = Cell::new(PipelineStage::Resolve);
        let pipeline = async {
            let resolution = resolver.resolve(&root).await?;
            let report = installer
                .install_observed(&resolution, &ctx, &options, |next| stage.set(next))
                .await?;
            Ok::<_, CompkitError>((resolution, report))
        };

        let (resolution, report) = tokio::select! {
            result = pipeline => result?,
            _ = tokio::signal::ctrl_c() => {
                return Err(CompkitError::Cancelled { stage: stage.get() }.into());
            }
        };

        if !quiet {
            print_summary(&resolution, &report);
        }
        Ok(())
    }
}

fn print_summary(resolution: &ResolutionResult, report: &InstallReport) {
    for conflict in &report.conflicts {
        eprintln!(
            "{}: '{}' requires {}@{} but {} was kept",
            "warning".yellow().bold(),
            conflict.requested_by,
            conflict.name,
            conflict.requested,
            conflict.chosen
        );
    }

    for file in &report.files {
        let label = match file.status {
            FileStatus::Created => "created".green(),
            FileStatus::Updated => "updated".yellow(),
            FileStatus::Unchanged => "unchanged".dimmed(),
        };
        println!("  {label:>9} {}", file.path.display());
    }

    if !report.packages.is_empty() {
        println!("\n{}", "Packages:".bold());
        for (name, range) in &report.packages {
            println!("  {name}@{range}");
        }
    }

    let root = &resolution.root.reference;
    let counts = format!(
        "{} created, {} updated, {} unchanged",
        report.count(FileStatus::Created),
        report.count(FileStatus::Updated),
        report.count(FileStatus::Unchanged)
    );
    if report.dry_run {
        println!("\n{} {root} ({counts}); no files were written", "Dry run:".yellow().bold());
    } else {
        println!(
            "\n{} {root} and {} dependenc{} ({counts})",
            "Installed".green().bold(),
            resolution.flattened_components.len().saturating_sub(1),
            if resolution.flattened_components.len() == 2 { "y" } else { "ies" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        add: AddCommand,
    }

    fn parse(args: &[&str]) -> AddCommand {
        let mut argv = vec!["add"];
        argv.extend_from_slice(args);
        Wrapper::parse_from(argv).add
    }

    #[test]
    fn test_flags_build_the_transform_context() {
        let cmd = parse(&[
            "dialog",
            "--to",
            "src/ui",
            "--js",
            "--alias",
            "@/registry/ui=./ui",
            "--alias",
            "@/registry/lib=@/lib",
            "--style",
            "global=styles/app.css",
            "--class-helper",
            "cn=@/lib/utils",
        ]);
        assert_eq!(cmd.install_options(4).target_dir, PathBuf::from("src/ui"));
        let ctx = cmd.transform_context();
        assert!(!ctx.typescript);
        assert_eq!(ctx.alias_map, vec![AliasRule::new("@/registry/ui", "./ui"), AliasRule::new("@/registry/lib", "@/lib")]);
        assert_eq!(
            ctx.style_strategy,
            StyleStrategy::Global {
                sheet: PathBuf::from("styles/app.css")
            }
        );
        assert_eq!(ctx.class_helper.map(|h| h.module), Some("@/lib/utils".to_string()));
    }

    #[test]
    fn test_version_flag_pins_the_root() {
        assert_eq!(parse(&["button"]).root().unwrap(), ComponentRef::latest("button"));
        assert_eq!(parse(&["button", "--version", "1.2.0"]).root().unwrap(), ComponentRef::new("button", "1.2.0"));
        assert_eq!(parse(&["button@2.0.0"]).root().unwrap(), ComponentRef::new("button", "2.0.0"));
    }

    #[test]
    fn test_invalid_flag_values_are_rejected() {
        assert!(Wrapper::try_parse_from(["add", "x", "--alias", "nope"]).is_err());
        assert!(Wrapper::try_parse_from(["add", "x", "--style", "inline"]).is_err());
    }
}
