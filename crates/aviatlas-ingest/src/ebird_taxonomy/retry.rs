//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Every attempt failed
#[derive(Error, Debug)]
#[error("failed after {attempts} attempts: {last_error:#}")]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: anyhow::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 behaves as 1
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            ..Self::default()
        }
    }

    /// Single attempt, no sleeping
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the given failed attempt (1-based)
    ///
    /// With the defaults: 1s after the first failure, 2s after the second.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.initial_backoff
            .saturating_mul(self.multiplier.saturating_pow(exponent))
    }

    /// Run `op` until it succeeds or the attempts run out
    ///
    /// `op` receives the 1-based attempt number. No sleep follows the last
    /// attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let max_attempts = self.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("{} attempt {}/{}", label, attempt, max_attempts);

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {:#}. Retrying in {:?}...",
                        label, attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) => {
                    warn!("{} failed after {} attempts: {:#}", label, attempt, e);
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                },
            }
        }
    }
}
