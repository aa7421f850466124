//! All-or-nothing promotion of staged files.
//!
//! Every output file is first written to a temp file beside its target
//! (`.<name>.<transaction-id>.compkit-tmp`). [`InstallTransaction::commit`] then moves any
//! existing target aside as a backup and renames the temp file into place, one file at a
//! time. If any step fails, every file promoted so far is restored from its backup (or
//! removed if it did not exist before), remaining temp files are deleted and directories
//! created for staging are removed again.
//!
//! Dropping a transaction that was neither committed nor rolled back rolls it back, so a
//! cancelled install future leaves the project untouched.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::{BACKUP_FILE_SUFFIX, STAGED_FILE_SUFFIX};
use crate::core::{CompkitError, Result};

/// A file written to a temporary path, waiting for promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Where the file ends up
    pub target_path: PathBuf,
    /// What it will contain
    pub content: String,
    /// Where it is staged
    pub temp_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

#[derive(Debug)]
struct Promoted {
    target: PathBuf,
    backup: Option<PathBuf>,
}

/// One install operation's set of staged files.
#[derive(Debug)]
pub struct InstallTransaction {
    id: Uuid,
    staged: Vec<StagedFile>,
    promoted: Vec<Promoted>,
    created_dirs: Vec<PathBuf>,
    state: TransactionState,
}

impl Default for InstallTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallTransaction {
    /// Open an empty transaction with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            staged: Vec::new(),
            promoted: Vec::new(),
            created_dirs: Vec::new(),
            state: TransactionState::Open,
        }
    }

    /// Transaction id, also embedded in temp and backup file names.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Files staged so far, in staging order.
    #[must_use]
    pub fn staged(&self) -> &[StagedFile] {
        &self.staged
    }

    /// Whether every staged file has been promoted.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    /// Write `content` to a temp file beside `target_path`.
    ///
    /// Missing parent directories are created and remembered for rollback.
    ///
    /// # Errors
    ///
    /// [`CompkitError::FileSystem`] when the directory or temp file cannot be written.
    pub async fn stage(&mut self, target_path: PathBuf, content: String) -> Result<&StagedFile> {
        if let Some(parent) = target_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.create_dirs(parent).await?;
        }

        let temp_path = sibling_path(&target_path, self.id, STAGED_FILE_SUFFIX);
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| CompkitError::fs("stage", &temp_path, &e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| CompkitError::fs("stage", &temp_path, &e))?;
        file.sync_all().await.map_err(|e| CompkitError::fs("sync", &temp_path, &e))?;

        debug!("Staged {} at {}", target_path.display(), temp_path.display());
        self.staged.push(StagedFile {
            target_path,
            content,
            temp_path,
        });
        Ok(&self.staged[self.staged.len() - 1])
    }

    async fn create_dirs(&mut self, dir: &Path) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(path) = current.filter(|p| !p.as_os_str().is_empty()) {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                break;
            }
            missing.push(path.to_path_buf());
            current = path.parent();
        }
        if missing.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(dir).await.map_err(|e| CompkitError::fs("create directory", dir, &e))?;
        // shallowest first; rollback walks them in reverse
        self.created_dirs.extend(missing.into_iter().rev());
        Ok(())
    }

    /// Promote every staged file.
    ///
    /// # Errors
    ///
    /// [`CompkitError::PromotionFailure`] naming the file that could not be promoted. The
    /// transaction has been rolled back when this is returned.
    pub fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Open {
            return Err(CompkitError::Other {
                message: format!("Transaction {} is no longer open", self.id),
            });
        }

        for index in 0..self.staged.len() {
            if let Err(error) = self.promote(index) {
                warn!("Promotion failed, rolling back transaction {}: {error}", self.id);
                self.rollback();
                return Err(error);
            }
        }

        for promoted in &self.promoted {
            if let Some(backup) = &promoted.backup
                && let Err(e) = fs::remove_file(backup)
            {
                warn!("Failed to remove backup {}: {e}", backup.display());
            }
        }
        self.state = TransactionState::Committed;
        debug!("Committed transaction {} ({} files)", self.id, self.promoted.len());
        Ok(())
    }

    fn promote(&mut self, index: usize) -> Result<()> {
        let staged = &self.staged[index];
        let target = staged.target_path.clone();
        let failure = |e: std::io::Error| CompkitError::PromotionFailure {
            path: target.clone(),
            reason: e.to_string(),
        };

        let backup = if target.exists() {
            let backup = sibling_path(&target, self.id, BACKUP_FILE_SUFFIX);
            fs::rename(&target, &backup).map_err(failure)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staged.temp_path, &target) {
            if let Some(backup) = &backup
                && let Err(restore) = fs::rename(backup, &target)
            {
                warn!("Failed to restore {} from backup: {restore}", target.display());
            }
            return Err(failure(e));
        }

        self.promoted.push(Promoted {
            target,
            backup,
        });
        Ok(())
    }

    /// Undo everything this transaction did. Best effort; failures are logged.
    pub fn rollback(&mut self) {
        for promoted in self.promoted.drain(..).rev() {
            match &promoted.backup {
                Some(backup) => {
                    if let Err(e) = fs::rename(backup, &promoted.target) {
                        warn!("Failed to restore {}: {e}", promoted.target.display());
                    }
                }
                None => {
                    if let Err(e) = fs::remove_file(&promoted.target) {
                        warn!("Failed to remove {}: {e}", promoted.target.display());
                    }
                }
            }
        }

        for staged in &self.staged {
            if staged.temp_path.exists()
                && let Err(e) = fs::remove_file(&staged.temp_path)
            {
                warn!("Failed to remove {}: {e}", staged.temp_path.display());
            }
        }

        for dir in self.created_dirs.drain(..).rev() {
            // only succeeds for empty directories
            let _ = fs::remove_dir(&dir);
        }

        self.state = TransactionState::RolledBack;
        debug!("Rolled back transaction {}", self.id);
    }
}

impl Drop for InstallTransaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Open
            && (!self.staged.is_empty() || !self.created_dirs.is_empty())
        {
            warn!("Transaction {} dropped before commit, rolling back", self.id);
            self.rollback();
        }
    }
}

/// `.<file name>.<id>.<suffix>` in the same directory as `target`.
fn sibling_path(target: &Path, id: Uuid, suffix: &str) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(format!(".{}.{suffix}", id.simple()));
    target.with_file_name(name)
}

/// Original target of a temp or backup file name, if `name` is one.
pub(super) fn original_name(name: &str, suffix: &str) -> Option<String> {
    let inner = name.strip_prefix('.')?.strip_suffix(suffix)?.strip_suffix('.')?;
    let (original, id) = inner.rsplit_once('.')?;
    (Uuid::try_parse(id).is_ok() && !original.is_empty()).then(|| original.to_string())
}
