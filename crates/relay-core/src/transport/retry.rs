//! Retry with exponential backoff

use crate::error::{RelayError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// How a transport retries transient failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later one
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Add up to 25% random delay on top of the exponential schedule
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt ceiling and base delay, no jitter
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter: false,
            ..Self::default()
        }
    }

    /// Delay after the failed attempt with zero-based index `attempt`: base × 2^attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if !self.jitter {
            return delay;
        }
        let spread = delay.as_millis() as u64 / 4;
        if spread == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

/// Outcome of a single failed attempt
#[derive(Debug)]
pub enum AttemptError {
    /// Connection error, timeout or 5xx; worth retrying
    Transient(String),
    /// 4xx; surfaces immediately
    Rejected { status: u16, message: String },
    /// Anything else that must not be retried
    Fatal(RelayError),
}

/// Run `op` until it succeeds, is rejected, or runs out of attempts.
///
/// `op` receives the zero-based attempt index. The backoff sleep is a plain
/// `tokio::time::sleep`, so dropping the returned future abandons both the
/// in-flight attempt and any pending wait.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Rejected { status, message }) => {
                return Err(RelayError::TransportRejected { status, message });
            }
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Transient(message)) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %message,
                    "Transient transport failure"
                );
                last_error = message;
                if attempt + 1 < attempts {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    Err(RelayError::TransportExhausted {
        attempts,
        last_error,
    })
}
