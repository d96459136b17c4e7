//! Retry policy with exponential backoff and jitter
//!
//! Decides whether a failed attempt is re-run and how long to back off
//! first. Only `Retryable`-classified failures are eligible; fatal and
//! timeout classifications always stop.

use std::time::Duration;

use rand::Rng;

use crate::config::TransactionConfig;
use crate::error::ErrorClass;

/// Cap on the backoff exponent to prevent overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-run the unit of work after the given backoff delay.
    RetryAfter(Duration),
    /// Surface the failure as terminal.
    Stop,
}

/// Retry policy with configurable exponential backoff and jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&TransactionConfig::default())
    }
}

impl From<&TransactionConfig> for RetryPolicy {
    fn from(config: &TransactionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter_factor: config.jitter_factor,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit bounds
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts, base_delay, max_delay, jitter_factor: 0.5 }
    }

    /// Set the jitter factor (clamped to 0.0..=1.0)
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Get the maximum number of total attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide whether to retry after the given completed attempt.
    ///
    /// `attempt` is the 1-based count of attempts already made. Only
    /// `Retryable` failures are eligible, and only while attempts remain.
    pub fn decide(&self, attempt: u32, class: ErrorClass) -> RetryDecision {
        if class != ErrorClass::Retryable {
            return RetryDecision::Stop;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::Stop;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt))
    }

    /// Calculate the backoff delay for a given attempt with jitter applied.
    ///
    /// `delay = base * 2^(attempt-1)` capped at `max_delay`, plus or minus a
    /// random jitter proportional to the delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self.exponential_delay(attempt);
        self.apply_jitter(exponential)
    }

    fn exponential_delay(&self, attempt: u32) -> Duration {
        let base_millis = self.base_delay.as_millis() as u64;
        let max_millis = self.max_delay.as_millis() as u64;

        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);
        let delay_millis = base_millis.saturating_mul(multiplier).min(max_millis);

        Duration::from_millis(delay_millis)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let delay_millis = delay.as_millis() as f64;
        let jitter_range = delay_millis * self.jitter_factor;

        let jitter = rng.gen_range(-jitter_range / 2.0..=jitter_range / 2.0);
        let final_millis = (delay_millis + jitter).max(0.0) as u64;

        Duration::from_millis(final_millis)
    }
}
