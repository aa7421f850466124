//! Cross-process lock on an installation target.
//!
//! Two installs into one directory would otherwise race: the second run's sweep treats the
//! first run's staged files as leftovers of a crash and deletes them mid-transaction.
//! [`Installer::install`](super::Installer::install) therefore holds a [`ProjectLock`] on
//! the target from the sweep until the transaction has committed.
//!
//! File operations run on `spawn_blocking` so waiting for a held lock never stalls the
//! runtime's worker threads.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::constants::{
    DEFAULT_LOCK_TIMEOUT, LOCK_FILE_NAME, LOCK_MAX_BACKOFF_DELAY_MS, LOCK_STARTING_BACKOFF_DELAY_MS,
};
use crate::core::{CompkitError, Result};

/// An exclusive OS file lock on `<target>/.compkit.lock`, released on drop.
///
/// Dropping the lock deletes the lock file and any directories created to hold it that
/// are still empty, so a failed install leaves no trace.
#[derive(Debug)]
pub struct ProjectLock {
    /// Lock is held while the handle is open
    _file: Arc<File>,
    lock_path: PathBuf,
    /// Directories created for the lock file, deepest first
    created_dirs: Vec<PathBuf>,
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        debug!(path = %self.lock_path.display(), "Install lock released");
        if let Err(e) = std::fs::remove_file(&self.lock_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(error = %e, "Failed to remove lock file");
        }
        remove_empty(&self.created_dirs);
    }
}

impl ProjectLock {
    /// Take the lock on `target_dir`, waiting up to [`DEFAULT_LOCK_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// [`CompkitError::FileSystem`] when the lock file cannot be created or another
    /// process keeps the lock past the timeout.
    pub async fn acquire(target_dir: &Path) -> Result<Self> {
        Self::acquire_with_timeout(target_dir, DEFAULT_LOCK_TIMEOUT).await
    }

    /// Take the lock on `target_dir`, waiting up to `timeout`.
    ///
    /// Attempts are non-blocking, retried with exponential backoff (10ms up to 500ms).
    ///
    /// # Errors
    ///
    /// See [`ProjectLock::acquire`].
    pub async fn acquire_with_timeout(target_dir: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = target_dir.join(LOCK_FILE_NAME);
        debug!(path = %lock_path.display(), "Waiting for install lock");

        let created_dirs = missing_dirs(target_dir);
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|e| CompkitError::fs("create directory", target_dir, &e))?;

        let open_path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .map_err(|e| lock_error(&lock_path, format!("lock task failed: {e}")))?
        .map_err(|e| CompkitError::fs("open lock file", &lock_path, &e))?;
        let file = Arc::new(file);

        let start = Instant::now();
        let backoff = ExponentialBackoff::from_millis(LOCK_STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(LOCK_MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let attempt = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || attempt.try_lock_exclusive())
                .await
                .map_err(|e| lock_error(&lock_path, format!("lock task failed: {e}")))?;

            if let Ok(true) = locked {
                debug!(
                    path = %lock_path.display(),
                    wait_ms = start.elapsed().as_millis(),
                    "Install lock acquired"
                );
                return Ok(Self {
                    _file: file,
                    lock_path,
                    created_dirs,
                });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        remove_empty(&created_dirs);
        Err(lock_error(
            &lock_path,
            format!("another install holds the lock (waited {timeout:?})"),
        ))
    }

    /// The lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

fn lock_error(path: &Path, reason: String) -> CompkitError {
    CompkitError::FileSystem {
        operation: "lock".to_string(),
        path: path.to_path_buf(),
        reason,
    }
}

/// Ancestors of `dir` (itself included) that do not exist yet, deepest first.
fn missing_dirs(dir: &Path) -> Vec<PathBuf> {
    dir.ancestors()
        .filter(|a| !a.as_os_str().is_empty())
        .take_while(|a| !a.exists())
        .map(Path::to_path_buf)
        .collect()
}

fn remove_empty(dirs: &[PathBuf]) {
    for dir in dirs {
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_lock_file_removed_on_release() {
        let dir = TempDir::new().unwrap();

        let lock = ProjectLock::acquire(dir.path()).await.unwrap();
        let path = lock.path().to_path_buf();
        assert_eq!(path, dir.path().join(".compkit.lock"));
        assert!(path.exists());

        drop(lock);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_created_target_is_removed_when_left_empty() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("src").join("components");

        let lock = ProjectLock::acquire(&target).await.unwrap();
        assert!(target.is_dir());
        drop(lock);
        assert!(!dir.path().join("src").exists());

        let lock = ProjectLock::acquire(&target).await.unwrap();
        std::fs::write(target.join("button.tsx"), "export {}\n").unwrap();
        drop(lock);
        assert!(target.join("button.tsx").exists());
    }

    #[tokio::test]
    async fn test_second_holder_waits_for_release() {
        let dir = TempDir::new().unwrap();
        let target = Arc::new(dir.path().to_path_buf());
        let barrier = Arc::new(Barrier::new(2));

        let first = {
            let target = Arc::clone(&target);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                let _lock = ProjectLock::acquire(&target).await.unwrap();
                barrier.wait().await;
                tokio::time::sleep(Duration::from_millis(100)).await;
            })
        };
        let second = tokio::spawn(async move {
            barrier.wait().await;
            let start = Instant::now();
            let _lock = ProjectLock::acquire(&target).await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(50));
        });

        first.await.unwrap();
        second.await.unwrap();
    }

    #[tokio::test]
    async fn test_acquire_times_out_while_held() {
        let dir = TempDir::new().unwrap();
        let held = ProjectLock::acquire(dir.path()).await.unwrap();

        let err = ProjectLock::acquire_with_timeout(dir.path(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CompkitError::FileSystem { ref operation, .. } if operation == "lock"));
        assert!(held.path().exists());
    }
}
