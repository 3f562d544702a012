//! # Retry Backoff
//!
//! Delay schedule between attempts on a single gateway, and the sleep
//! primitive used to wait it out.

use async_trait::async_trait;
use pay_core::FailoverConfig;
use std::time::Duration;

/// Waits between retry attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded attempts with a fixed or doubling delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per gateway, the first one included. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub exponential: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, exponential: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            exponential,
        }
    }

    pub fn from_failover(config: &FailoverConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_delay_duration(),
            config.exponential_backoff,
        )
    }

    /// Delay after the failed `attempt` (1-indexed): `base * 2^(attempt-1)`
    /// when exponential, `base` otherwise.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Whether another attempt may follow `attempt`
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_failover(&FailoverConfig::default())
    }
}
