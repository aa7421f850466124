//! Global constants used throughout the compkit codebase.
//!
//! Retry parameters, timeouts, parallelism defaults and the file-name markers used for
//! staged files. Defining them centrally keeps magic numbers discoverable.

use std::time::Duration;

/// Registry used when neither `--registry` nor `COMPKIT_REGISTRY` is given.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.compkit.dev";

/// Total attempts for a retriable registry request (first try included).
pub const MAX_FETCH_ATTEMPTS: usize = 3;

/// Starting delay for registry retry backoff (200ms), doubled on each attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 200;

/// Maximum backoff delay between registry retries (5 seconds).
pub const MAX_BACKOFF_DELAY_MS: u64 = 5_000;

/// Upper bound on a server-provided `Retry-After` hint.
///
/// A registry asking for a longer pause is still honored, but only up to this cap.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Timeout for a single registry HTTP request (30 seconds).
pub const REGISTRY_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of pages followed when listing registry components.
pub const MAX_LISTING_PAGES: u32 = 100;

/// Minimum number of parallel operations regardless of CPU count.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to CPU core count for default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// How long an install waits for another process holding the target's lock (30 seconds).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Starting delay between attempts to take a held install lock (10ms).
pub const LOCK_STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Maximum delay between attempts to take a held install lock (500ms).
pub const LOCK_MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Name of the lock file an install holds inside its target directory.
pub const LOCK_FILE_NAME: &str = ".compkit.lock";

/// Suffix of staged files written beside their targets.
pub const STAGED_FILE_SUFFIX: &str = "compkit-tmp";

/// Suffix of backups taken of existing targets during promotion.
pub const BACKUP_FILE_SUFFIX: &str = "compkit-bak";

/// Default worker pool size: `max(MIN_PARALLELISM, cores * PARALLELISM_CORE_MULTIPLIER)`.
#[must_use]
pub fn default_max_parallel() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(FALLBACK_CORE_COUNT);
    std::cmp::max(MIN_PARALLELISM, cores * PARALLELISM_CORE_MULTIPLIER)
}
