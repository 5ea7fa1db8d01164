//! Retry-until-success
//!
//! Bounded, fixed-interval retries for side calls that fail only until an
//! external system catches up (a freshly registered daemon not yet visible to
//! the query layer). Exhausting the budget is fatal, and so is an error the
//! caller classifies as permanent.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Delay between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock sleeper
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("could not complete {label} after {attempts} attempts: {last_error}")]
    Exhausted { label: String, attempts: u32, last_error: E },

    #[error("{label} failed: {error}")]
    Aborted { label: String, error: E },

    #[error("{label} cancelled")]
    Cancelled { label: String },
}

/// Run `op` until it succeeds, the attempt budget runs out, or `cancel` fires.
///
/// Cancellation is checked before every attempt and raced against each sleep.
pub async fn retry_until_success<T, E, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    retry_while(label, policy, sleeper, cancel, |_| true, op).await
}

/// Like [`retry_until_success`], but stops at the first error `is_transient` rejects.
pub async fn retry_while<T, E, P, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    is_transient: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    P: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled {
                label: label.to_string(),
            });
        }

        attempt += 1;
        let error = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        debug!(label, attempt, error = %error, "Attempt failed");
        if !is_transient(&error) {
            return Err(RetryError::Aborted {
                label: label.to_string(),
                error,
            });
        }
        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                label: label.to_string(),
                attempts: attempt,
                last_error: error,
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled {
                    label: label.to_string(),
                });
            }
            _ = sleeper.sleep(policy.interval) => {}
        }
    }
}
