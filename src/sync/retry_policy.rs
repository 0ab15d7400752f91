//! Retry policy for failed partition attempts.
//!
//! Implements exponential backoff with configurable parameters. Backoffs here
//! are short (milliseconds) because they happen inline while the job holds the
//! shop lock and burns its wall clock budget.

use super::models::SyncStepError;
use crate::config::SyncRetrySettings;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before a partition is marked failed.
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds (cap for exponential growth).
    pub max_backoff_ms: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(settings: &SyncRetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff_ms: settings.initial_backoff_ms,
            max_backoff_ms: settings.max_backoff_ms,
            backoff_multiplier: settings.backoff_multiplier,
        }
    }

    /// Backoff before retry number `retry_count + 1`.
    ///
    /// Uses exponential backoff: `initial_backoff * multiplier^retry_count`,
    /// capped at `max_backoff_ms`.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let backoff = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(retry_count as i32);
        Duration::from_millis(backoff.min(self.max_backoff_ms as f64) as u64)
    }

    /// Check if an error should be retried given the current retry count.
    pub fn should_retry(&self, error: &SyncStepError, retry_count: u32) -> bool {
        error.retryable && retry_count < self.max_retries
    }

    /// Copy of this policy with the retry ceiling lowered to `budget`, when
    /// one is given. A budget can never raise the configured ceiling.
    pub fn capped(&self, budget: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            max_retries: budget.map_or(self.max_retries, |b| b.min(self.max_retries)),
            ..self.clone()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}
