//! Bounded retry with linearly increasing backoff
//!
//! Delays are produced through the [`Pause`] seam so the policy can be driven
//! by tokio's timer in production and recorded in tests.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use super::FetchOutcome;

/// Something that can wait for a given duration
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Waits on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry policy: `max_retries` extra attempts after the first, waiting
/// `step * n` before the n-th retry (2s, 4s, 6s with the defaults)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, step: Duration) -> Self {
        Self { max_retries, step }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.step * retry
    }

    /// Run `op` until it succeeds, yields a non-retryable outcome, or the
    /// retry budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, pause: &dyn Pause, mut op: F) -> FetchOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = FetchOutcome<T>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = op(attempt).await;
            if !outcome.is_retryable() || attempt > self.max_retries {
                return outcome;
            }

            let delay = self.delay_for(attempt);
            if let FetchOutcome::Transient(ref err) = outcome {
                tracing::warn!(
                    attempt,
                    max_retries = self.max_retries,
                    delay_secs = delay.as_secs_f64(),
                    "Retrying after transient failure: {}",
                    err
                );
            }
            pause.pause(delay).await;
            attempt += 1;
        }
    }
}
