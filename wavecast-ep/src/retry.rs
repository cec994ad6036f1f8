//! Unified retry policy for external provider calls
//!
//! Every collaborator call site (text generation, speech synthesis) retries
//! through this one abstraction instead of carrying its own ad-hoc loop:
//! fixed backoff, bounded attempts, transient-only predicate.

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Fixed-backoff retry policy with a bounded attempt count
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            // At least one attempt is always made
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run an operation, retrying transient failures with fixed backoff.
    ///
    /// Permanent errors are returned immediately; a transient error on the
    /// final attempt is surfaced as-is so callers see the original cause.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %err,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
