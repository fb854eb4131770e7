//! Retry policy with exponential backoff.

use std::future::Future;
use std::time::Duration;

use crate::error::{CapabilityError, StepFailure};

/// Per-step retry policy for capability invocations.
///
/// Errors are classified before deciding whether to retry: transient
/// failures consume an attempt and back off exponentially
/// (`interval × rate^(n-1)` after the n-th attempt, so the defaults give
/// 2s, 4s); permanent failures stop immediately. Backoff waits are
/// scheduled sleeps, never busy-waits.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
    backoff_rate: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(2),
            backoff_rate: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, interval: Duration, backoff_rate: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
            backoff_rate,
        }
    }

    /// Returns the maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay scheduled after the `attempt`-th failure
    /// (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_rate.powi(attempt.saturating_sub(1) as i32);
        self.interval.mul_f64(factor)
    }

    /// Runs `op` under this policy until it succeeds, declines, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, step: &'static str, mut op: F) -> Result<T, StepFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(CapabilityError::Permanent(reason)) => {
                    return Err(StepFailure::Declined(reason));
                }
                Err(CapabilityError::Transient(reason)) => {
                    metrics::counter!("capability_retry_attempts_total", "step" => step)
                        .increment(1);
                    if attempt < self.max_attempts {
                        let delay = self.delay_after(attempt);
                        tracing::warn!(
                            step,
                            attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %reason,
                            "transient capability failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(StepFailure::Exhausted {
                            attempts: self.max_attempts,
                            last_error: reason,
                        });
                    }
                }
            }
        }
        unreachable!("retry loop always returns within max_attempts")
    }
}
