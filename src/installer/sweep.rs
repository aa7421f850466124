//! Cleanup of files left behind by an interrupted install.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::transaction::original_name;
use crate::constants::{BACKUP_FILE_SUFFIX, STAGED_FILE_SUFFIX};
use crate::core::{CompkitError, Result};

/// What [`sweep_stale_files`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Stale temp files deleted
    pub removed_temp_files: usize,
    /// Backups moved back over their target
    pub restored_backups: usize,
}

/// Remove stale temp files under `root` and put stale backups back in place.
///
/// A backup only outlives its transaction when the process died mid-commit, so the backup
/// holds the pre-install content and wins over whatever is at the target path.
///
/// # Errors
///
/// [`CompkitError::FileSystem`] when a stale file cannot be removed or restored.
pub fn sweep_stale_files(root: &Path) -> Result<SweepSummary> {
    let mut summary = SweepSummary::default();
    if !root.is_dir() {
        return Ok(summary);
    }

    let files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();

    for path in &files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if original_name(name, STAGED_FILE_SUFFIX).is_some() {
            fs::remove_file(path).map_err(|e| CompkitError::fs("remove stale temp file", path, &e))?;
            debug!("Removed stale temp file {}", path.display());
            summary.removed_temp_files += 1;
        } else if let Some(original) = original_name(name, BACKUP_FILE_SUFFIX) {
            let target = path.with_file_name(original);
            if target.exists() {
                fs::remove_file(&target).map_err(|e| CompkitError::fs("restore backup", &target, &e))?;
            }
            fs::rename(path, &target).map_err(|e| CompkitError::fs("restore backup", path, &e))?;
            warn!("Restored {} from an interrupted install", target.display());
            summary.restored_backups += 1;
        }
    }

    if summary != SweepSummary::default() {
        info!(
            "Cleaned up after an interrupted install: {} temp file(s) removed, {} backup(s) restored",
            summary.removed_temp_files, summary.restored_backups
        );
    }
    Ok(summary)
}
