//! Installation of resolved components into a project.
//!
//! [`Installer::install`] takes a [`ResolutionResult`] and a [`TransformContext`] and makes
//! the project contain every transformed file, or leaves it exactly as it was.
//!
//! # Installation Process
//!
//! 1. **Plan**: every manifest file gets its output path; two components claiming the same
//!    path fail with [`CompkitError::DuplicateTarget`]
//! 2. **Transform**: files run through the [`TransformPipeline`] on blocking workers,
//!    bounded by `max_parallel`. Every file is attempted; the first failure in install
//!    order is returned after all have finished, and nothing has been written
//! 3. **Lock and sweep**: a [`ProjectLock`] on the target is taken and held until the end;
//!    temp files and backups left behind by an interrupted run are then cleaned up
//! 4. **Merge**: under [`StyleStrategy::Global`] component stylesheets become marked blocks
//!    of the shared sheet; package ranges are merged into `package.json` when requested
//! 5. **Conflict check**: existing targets with different content fail the whole install
//!    with [`CompkitError::FileConflict`] unless `force` is set. Identical targets are
//!    reported [`FileStatus::Unchanged`] and skipped
//! 6. **Stage and commit**: remaining files are staged beside their targets and promoted
//!    in one [`InstallTransaction`]
//!
//! A dry run skips step 3 and stops after step 5; it never touches the target directory.

mod merge;
mod project_lock;
mod sweep;
mod transaction;


pub use merge::{merge_package_json, upsert_style_block};
pub use project_lock::ProjectLock;
pub use sweep::{SweepSummary, sweep_stale_files};
pub use transaction::{InstallTransaction, StagedFile};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{StreamExt, stream};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::constants::default_max_parallel;
use crate::core::{CompkitError, PipelineStage, Result};
use crate::resolver::{ResolutionResult, VersionConflict};
use crate::transform::{
    Language, StyleStrategy, TransformContext, TransformPipeline, TransformedFile,
};

/// Caller-controlled installation options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Directory component files are installed into
    pub target_dir: PathBuf,
    /// Overwrite existing files with different content
    pub force: bool,
    /// Resolve, transform and check conflicts, but write nothing
    pub dry_run: bool,
    /// Concurrent transform workers
    pub max_parallel: usize,
    /// `package.json` to merge third-party packages into
    pub package_json: Option<PathBuf>,
}

impl InstallOptions {
    /// Defaults: no force, no dry run, default parallelism, no package.json merge.
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            force: false,
            dry_run: false,
            max_parallel: default_max_parallel(),
            package_json: None,
        }
    }

    /// Set `force`.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set `dry_run`.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the transform worker limit (at least 1).
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Merge package ranges into this `package.json`.
    #[must_use]
    pub fn with_package_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_json = Some(path.into());
        self
    }
}

/// What happened to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// The file did not exist
    Created,
    /// The file existed with different content
    Updated,
    /// The file already had exactly this content
    Unchanged,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        })
    }
}

/// One output file of an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledFile {
    /// Path written (target directory joined with the output path)
    pub path: PathBuf,
    /// Component the file belongs to; merged files list every contributor
    pub component: String,
    /// Outcome
    pub status: FileStatus,
    /// `sha256:<hex>` of the content
    pub checksum: String,
}

/// Outcome of [`Installer::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Transaction id; nil for dry runs and installs with nothing to write
    pub transaction_id: Uuid,
    /// Whether nothing was written on purpose
    pub dry_run: bool,
    /// Every output file, in install order
    pub files: Vec<InstalledFile>,
    /// Merged third-party package ranges
    pub packages: BTreeMap<String, String>,
    /// Version conflicts settled during resolution
    pub conflicts: Vec<VersionConflict>,
}

impl InstallReport {
    /// Number of files with `status`.
    #[must_use]
    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    /// The file installed at `path`, if any.
    #[must_use]
    pub fn file(&self, path: &Path) -> Option<&InstalledFile> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// `sha256:<hex>` of `content`.
#[must_use]
pub fn checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

struct TransformJob {
    component: String,
    source: PathBuf,
    content: String,
}

struct PlannedWrite {
    target: PathBuf,
    component: String,
    content: String,
    /// Files several components contribute to are updated in place, never conflicts
    merged: bool,
}

/// Runs the install process described in the [module documentation](self).
#[derive(Clone)]
pub struct Installer {
    pipeline: Arc<TransformPipeline>,
}

impl Default for Installer {
    fn default() -> Self {
        Self::new()
    }
}

impl Installer {
    /// Installer with the built-in transform chain.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pipeline(TransformPipeline::new())
    }

    /// Installer with a custom transform chain.
    #[must_use]
    pub fn with_pipeline(pipeline: TransformPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Install every file of `resolution`.
    ///
    /// # Errors
    ///
    /// - [`CompkitError::DuplicateTarget`] when two components write one path
    /// - [`CompkitError::ParseError`] / [`CompkitError::StyleReferenceError`] from transforms
    /// - [`CompkitError::FileConflict`] listing every conflicting path
    /// - [`CompkitError::PromotionFailure`] after the transaction was rolled back
    /// - [`CompkitError::FileSystem`] for I/O failures before promotion, or when another
    ///   install keeps the target locked
    ///
    /// In every case the project is left as it was before the call.
    pub async fn install(
        &self,
        resolution: &ResolutionResult,
        ctx: &TransformContext,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        self.install_observed(resolution, ctx, options, |_| {}).await
    }

    /// [`Installer::install`], calling `on_stage` as the transform and install stages begin.
    ///
    /// # Errors
    ///
    /// See [`Installer::install`].
    pub async fn install_observed<F: Fn(PipelineStage)>(
        &self,
        resolution: &ResolutionResult,
        ctx: &TransformContext,
        options: &InstallOptions,
        on_stage: F,
    ) -> Result<InstallReport> {
        on_stage(PipelineStage::Transform);
        let ctx = Arc::new(ctx.for_resolution(resolution));
        let jobs = plan_jobs(resolution, &ctx)?;
        debug!("Transforming {} file(s)", jobs.len());
        let transformed = self.transform_all(jobs, Arc::clone(&ctx), options.max_parallel).await?;

        on_stage(PipelineStage::Install);
        let _lock = if options.dry_run {
            None
        } else {
            let lock = ProjectLock::acquire(&options.target_dir).await?;
            sweep_stale_files(&options.target_dir)?;
            Some(lock)
        };

        let writes = plan_writes(transformed, &ctx, resolution, options).await?;
        let statuses = check_targets(&writes, options.force).await?;

        let mut report = InstallReport {
            transaction_id: Uuid::nil(),
            dry_run: options.dry_run,
            files: writes
                .iter()
                .zip(&statuses)
                .map(|(write, status)| InstalledFile {
                    path: write.target.clone(),
                    component: write.component.clone(),
                    status: *status,
                    checksum: checksum(write.content.as_bytes()),
                })
                .collect(),
            packages: resolution.npm_packages.clone(),
            conflicts: resolution.conflicts.clone(),
        };

        if options.dry_run {
            info!("Dry run: {} file(s) would be written", writes.len() - report.count(FileStatus::Unchanged));
            return Ok(report);
        }

        let pending: Vec<PlannedWrite> = writes
            .into_iter()
            .zip(statuses)
            .filter(|(_, status)| *status != FileStatus::Unchanged)
            .map(|(write, _)| write)
            .collect();
        if pending.is_empty() {
            info!("Everything is up to date");
            return Ok(report);
        }

        let mut transaction = InstallTransaction::new();
        for write in pending {
            transaction.stage(write.target, write.content).await?;
        }
        transaction.commit()?;

        report.transaction_id = transaction.id();
        info!(
            "Installed {} file(s) ({} created, {} updated)",
            transaction.staged().len(),
            report.count(FileStatus::Created),
            report.count(FileStatus::Updated)
        );
        Ok(report)
    }

    async fn transform_all(
        &self,
        jobs: Vec<TransformJob>,
        ctx: Arc<TransformContext>,
        max_parallel: usize,
    ) -> Result<Vec<(String, TransformedFile)>> {
        let results: Vec<Result<_>> = stream::iter(jobs)
            .map(|job| {
                let pipeline = Arc::clone(&self.pipeline);
                let ctx = Arc::clone(&ctx);
                let TransformJob {
                    component,
                    source,
                    content,
                } = job;
                async move {
                    tokio::task::spawn_blocking(move || {
                        pipeline.transform_file(&source, &content, &ctx).map(|file| (component, file))
                    })
                    .await
                    .map_err(|e| CompkitError::Other {
                        message: format!("Transform task failed: {e}"),
                    })?
                }
            })
            .buffered(max_parallel.max(1))
            .collect()
            .await;

        let mut transformed = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(file) => transformed.push(file),
                Err(e) => {
                    error!("{e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(transformed),
        }
    }
}

fn merges_into_sheet(ctx: &TransformContext, output: &Path) -> bool {
    matches!(ctx.style_strategy, StyleStrategy::Global { .. })
        && Language::from_path(output) == Language::Stylesheet
}

fn plan_jobs(resolution: &ResolutionResult, ctx: &TransformContext) -> Result<Vec<TransformJob>> {
    let mut claimed: HashMap<PathBuf, &str> = HashMap::new();
    let mut jobs = Vec::new();

    for manifest in resolution.manifests() {
        for file in &manifest.files {
            let output = ctx.output_path(Path::new(&file.path));
            if !merges_into_sheet(ctx, &output) {
                if let Some(first) = claimed.get(&output) {
                    return Err(CompkitError::DuplicateTarget {
                        path: output,
                        first: (*first).to_string(),
                        second: manifest.name.clone(),
                    });
                }
                claimed.insert(output, &manifest.name);
            }
            jobs.push(TransformJob {
                component: manifest.name.clone(),
                source: PathBuf::from(&file.path),
                content: file.content.clone(),
            });
        }
    }
    Ok(jobs)
}

async fn plan_writes(
    transformed: Vec<(String, TransformedFile)>,
    ctx: &TransformContext,
    resolution: &ResolutionResult,
    options: &InstallOptions,
) -> Result<Vec<PlannedWrite>> {
    let mut writes = Vec::new();
    let mut blocks: Vec<(String, String)> = Vec::new();

    for (component, file) in transformed {
        if merges_into_sheet(ctx, &file.path) {
            match blocks.iter_mut().find(|(name, _)| *name == component) {
                Some((_, css)) => {
                    css.push('\n');
                    css.push_str(&file.content);
                }
                None => blocks.push((component, file.content)),
            }
            continue;
        }
        writes.push(PlannedWrite {
            target: options.target_dir.join(&file.path),
            component,
            content: file.content,
            merged: false,
        });
    }

    if let StyleStrategy::Global {
        sheet,
    } = &ctx.style_strategy
        && !blocks.is_empty()
    {
        let target = options.target_dir.join(sheet);
        let mut content = read_text(&target).await?.unwrap_or_default();
        for (component, css) in &blocks {
            content = upsert_style_block(&content, component, css);
        }
        let components: Vec<&str> = blocks.iter().map(|(name, _)| name.as_str()).collect();
        writes.push(PlannedWrite {
            target,
            component: components.join(", "),
            content,
            merged: true,
        });
    }

    if let Some(path) = &options.package_json
        && !resolution.npm_packages.is_empty()
    {
        let existing = read_text(path).await?;
        let content = merge_package_json(path, existing.as_deref(), &resolution.npm_packages)?;
        writes.push(PlannedWrite {
            target: path.clone(),
            component: resolution.root.reference.name.clone(),
            content,
            merged: true,
        });
    }

    let mut claimed: HashMap<&Path, &str> = HashMap::new();
    for write in &writes {
        if let Some(first) = claimed.insert(&write.target, &write.component) {
            return Err(CompkitError::DuplicateTarget {
                path: write.target.clone(),
                first: first.to_string(),
                second: write.component.clone(),
            });
        }
    }
    Ok(writes)
}

/// Status of every planned write, failing when unforced writes would replace content.
async fn check_targets(writes: &[PlannedWrite], force: bool) -> Result<Vec<FileStatus>> {
    let mut statuses = Vec::with_capacity(writes.len());
    let mut conflicts = Vec::new();

    for write in writes {
        let status = match read_bytes(&write.target).await? {
            None => FileStatus::Created,
            Some(existing) if existing == write.content.as_bytes() => FileStatus::Unchanged,
            Some(_) => {
                if !write.merged && !force {
                    conflicts.push(write.target.clone());
                }
                FileStatus::Updated
            }
        };
        statuses.push(status);
    }

    if conflicts.is_empty() {
        Ok(statuses)
    } else {
        Err(CompkitError::FileConflict {
            paths: conflicts,
        })
    }
}

async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CompkitError::fs("read", path, &e)),
    }
}

async fn read_text(path: &Path) -> Result<Option<String>> {
    read_bytes(path)
        .await?
        .map(|bytes| {
            String::from_utf8(bytes).map_err(|e| CompkitError::FileSystem {
                operation: "read".to_string(),
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
