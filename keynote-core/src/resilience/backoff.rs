//! Exponential backoff for listener retries
//!
//! `delay(factor, failures) = factor * 2^failures` seconds. The failure count
//! belongs to one unbroken run of failures: it is reset the moment a message
//! is received and incremented after each wait.
//!
//! There is no cap and no jitter. Delays past what [`Duration`] can hold
//! saturate at [`Duration::MAX`].

use crate::config::DEFAULT_BACKOFF_FACTOR;
use std::time::Duration;

/// Wait before the next attempt after `failures` consecutive failures
pub fn backoff_delay(factor: f64, failures: u32) -> Duration {
    if factor <= 0.0 || factor.is_nan() {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
    let secs = factor * 2f64.powi(exponent);

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Failure counter paired with its backoff factor
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    factor: f64,
    failures: u32,
}

impl ExponentialBackoff {
    /// Create a new backoff with the default factor
    pub fn new() -> Self {
        Self::with_factor(DEFAULT_BACKOFF_FACTOR)
    }

    pub fn with_factor(factor: f64) -> Self {
        Self { factor, failures: 0 }
    }

    /// Delay for the current failure count, without advancing it
    pub fn current_delay(&self) -> Duration {
        backoff_delay(self.factor, self.failures)
    }

    /// Return the delay for the current count and advance the count
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay();
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Reset after a successful receive
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures recorded so far
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}
