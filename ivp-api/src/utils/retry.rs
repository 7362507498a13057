//! Retry with exponential backoff
//!
//! Vendor calls fail transiently (connection resets, 429, 5xx). Callers
//! classify their own errors; this module only decides when to try again.

use std::future::Future;
use std::time::Duration;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Retry bounds for one logical vendor call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1)
    pub max_attempts: u32,
    /// Sleep before the second attempt; doubles after each failure
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Backoff before attempt `attempt + 1` (1-based `attempt`)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// Errors for which `is_transient` returns false are returned immediately.
/// After the last attempt the final error is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    operation_name: &str,
    policy: RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying vendor call");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Vendor call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_transient(&err) {
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Vendor call failed: retry attempts exhausted"
                    );
                    return Err(err);
                }

                let backoff = policy.backoff_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient vendor failure, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
