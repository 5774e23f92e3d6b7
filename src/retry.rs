//! Bounded exponential backoff for the live providers.

use std::future::Future;
use std::time::Duration;

use crate::types::KbError;

/// Retry policy shared by the embedding and completion clients.
///
/// Only errors classified transient by [`KbError::is_transient`] are
/// retried; deterministic failures surface immediately.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
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
    /// Runs `operation` until it succeeds, fails terminally, or the attempt
    /// budget is exhausted. The delay doubles after each failed attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, KbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, KbError>>,
    {
        let mut delay = self.base_delay;
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        %err,
                        attempt,
                        max_attempts = self.max_attempts,
                        "{label}: transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
