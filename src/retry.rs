// src/retry.rs
//! Exponential backoff for transport-level failures inside one logical call.
//!
//! Callers classify errors with `should_retry`; anything that might already
//! have reached the remote side (a post that could have been published) must
//! be classified as final so a single publish never turns into two.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// 500ms, 1s, 2s, ... for the default base.
    pub fn delay_for(&self, attempt: u8) -> Duration {
        let shift = u32::from(attempt.saturating_sub(1)).min(16);
        self.base_delay.saturating_mul(1u32 << shift)
    }

    pub async fn run<T, E, F, Fut>(
        &self,
        what: &str,
        should_retry: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max = self.max_attempts.max(1);
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max && should_retry(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(what, attempt, error = %e, ?delay, "retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
