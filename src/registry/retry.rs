//! Bounded exponential backoff for registry requests.

use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

use crate::constants::{
    MAX_BACKOFF_DELAY_MS, MAX_FETCH_ATTEMPTS, MAX_RETRY_AFTER, STARTING_BACKOFF_DELAY_MS,
};
use crate::core::{CompkitError, Result};

/// How registry requests are retried.
///
/// Only [`CompkitError::is_retriable`] failures are retried. A rate-limit response waits
/// for at least the server's `Retry-After` hint (capped at [`MAX_RETRY_AFTER`]) instead
/// of the backoff delay. After `max_attempts` the last error is returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: usize,
    /// Delay before the second attempt, in milliseconds
    pub initial_delay_ms: u64,
    /// Ceiling for a single backoff delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_FETCH_ATTEMPTS,
            initial_delay_ms: STARTING_BACKOFF_DELAY_MS,
            max_delay: Duration::from_millis(MAX_BACKOFF_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff delays between attempts: `initial, 2×initial, 4×initial, ...` capped at
    /// `max_delay`.
    fn delays(&self) -> impl Iterator<Item = Duration> {
        // ExponentialBackoff multiplies base^n by the factor, so base 2 with a factor of
        // half the initial delay yields initial, 2×initial, ...
        let factor = (self.initial_delay_ms / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .take(self.max_attempts.saturating_sub(1))
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `what` labels log lines.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delays = self.delays();
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retriable() => return Err(e),
                Err(e) => e,
            };

            let Some(backoff) = delays.next() else {
                warn!("Giving up on {what} after {attempt} attempt(s): {error}");
                return Err(error);
            };

            let delay = match &error {
                CompkitError::RateLimited {
                    retry_after: Some(hint),
                    ..
                } => backoff.max((*hint).min(MAX_RETRY_AFTER)),
                _ => backoff,
            };
            debug!("Retrying {what} in {delay:?} (attempt {attempt} failed: {error})");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
