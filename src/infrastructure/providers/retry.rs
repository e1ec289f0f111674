use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::domain::errors::{DomainError, DomainResult};

/// Bounded exponential backoff for calls to external platforms.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, with up to 50% random jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let jitter_ms = (capped.as_millis() as u64) / 2;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        capped + Duration::from_millis(jitter)
    }

    /// Runs `op` until it succeeds, fails permanently, runs out of attempts, or `deadline`
    /// passes. The attempt number (starting at 1) is passed to `op`.
    pub async fn run<T, F, Fut>(&self, operation: &str, deadline: Instant, mut op: F) -> DomainResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout_at(deadline, op(attempt)).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(DomainError::UpstreamTransient(format!(
                        "{} timed out after {} attempt(s)",
                        operation, attempt
                    )))
                }
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    if Instant::now() + delay >= deadline {
                        tracing::warn!(
                            "{} failed on attempt {} and the deadline leaves no room to retry: {}",
                            operation,
                            attempt,
                            e
                        );
                        return Err(e);
                    }
                    tracing::warn!(
                        "{} failed on attempt {}/{}, retrying in {:?}: {}",
                        operation,
                        attempt,
                        self.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
