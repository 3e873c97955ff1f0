//! Uniform retry/timeout policy for external capability calls.
//!
//! Every provider call (transcription, summarization, dispatch) runs under
//! the same bounded policy regardless of which concrete provider backs it.
//! Only transport-level `Err` results are retried; a provider-reported
//! terminal outcome is a completed call.

use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
    timeout: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration, timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            timeout,
        }
    }

    /// Run `call` until it succeeds or attempts are exhausted. Each try is
    /// bounded by the per-call timeout; the delay between tries doubles.
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.base_delay;
        let mut last_err = None;

        for attempt in 1..=self.attempts {
            match timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    warn!(
                        "{} call failed (attempt {}/{}): {:#}",
                        what, attempt, self.attempts, err
                    );
                    last_err = Some(err);
                }
                Err(_) => {
                    warn!(
                        "{} call timed out after {:?} (attempt {}/{})",
                        what, self.timeout, attempt, self.attempts
                    );
                    last_err = Some(anyhow!("{} timed out after {:?}", what, self.timeout));
                }
            }

            if attempt < self.attempts {
                sleep(delay).await;
                delay *= 2;
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} failed with no attempts made", what)))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}
