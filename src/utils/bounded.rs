//! Bounded Request - timeout + retry wrapper
//!
//! Races one async operation against a timer and retries it with
//! exponential backoff (`base * 2^attempt`). Knows nothing about providers.
//!
//! An optional deadline caps the whole run: each attempt's timeout is
//! `min(timeout, time left)`, and a backoff that would end past the
//! deadline is not slept. Only retryable errors are retried.
//!
//! Retries re-invoke the operation from scratch, so it must be idempotent.
//! A timed-out attempt is not cancelled upstream: its future is dropped and
//! its result discarded.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::errors::SnapshotError;

/// Timeout and retry policy for one wrapped operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestBudget {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt (total attempts = retries + 1)
    pub retries: u32,
    /// Backoff base
    pub backoff_base: Duration,
    /// Hard end for all attempts and backoffs
    pub deadline: Option<Instant>,
}

impl RequestBudget {
    pub fn new(timeout: Duration, retries: u32, backoff_base: Duration) -> Self {
        Self {
            timeout,
            retries,
            backoff_base,
            deadline: None,
        }
    }

    /// Stop every attempt and backoff at `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay after the failed attempt `attempt` (0-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Timeout for an attempt starting now; zero once the deadline has passed
    fn attempt_timeout(&self) -> Duration {
        match self.deadline {
            Some(deadline) => self
                .timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.timeout,
        }
    }

    fn sleep_fits(&self, delay: Duration) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() + delay < deadline,
            None => true,
        }
    }
}

/// Run `op` under `budget`, returning the first success or the last error
pub async fn bounded_request<T, F, Fut>(budget: RequestBudget, mut op: F) -> Result<T, SnapshotError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SnapshotError>>,
{
    let total_attempts = budget.retries + 1;
    let mut last_error = None;

    for attempt in 0..total_attempts {
        if attempt > 0 {
            let delay = budget.backoff_for(attempt - 1);
            if !budget.sleep_fits(delay) {
                debug!("⏱️ Deadline reached, no retry after {} attempts", attempt);
                break;
            }
            debug!(
                "⏳ Retry {}/{} after {}ms",
                attempt + 1,
                total_attempts,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let timeout = budget.attempt_timeout();
        if timeout.is_zero() {
            last_error.get_or_insert(SnapshotError::Timeout { timeout_ms: 0 });
            break;
        }

        let outcome = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(SnapshotError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!(attempt = attempt + 1, code = e.code(), "Attempt failed: {}", e);
                let retryable = e.is_retryable();
                last_error = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        SnapshotError::Internal(format!("No attempt made after {} retries", budget.retries))
    }))
}
