//! Exponential backoff for retryable session failures.

use std::future::Future;
use std::time::Duration;

use log::debug;

use crate::config::RetryPolicy;
use crate::error::ConnectError;

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(20));
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Delay before retry number `attempt` with multiplicative jitter applied.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = 1.0 + (fastrand::f64() * 2.0 - 1.0) * jitter;
        let delay = (base * factor).min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(delay as u64)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of retries.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ConnectError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ConnectError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                debug!(
                    "Attempt {} failed with retryable error, retrying in {:?}: {}",
                    attempt + 1,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
