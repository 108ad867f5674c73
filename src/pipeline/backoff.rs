//! Exponential backoff state.
//!
//! The retry policy is a plain value: callers ask it for the next delay and
//! drive the wait themselves.
//!
//! Delays start at `base` and double on every attempt. Retrying stops once
//! the next delay would push the cumulative wait past `max_total`, or once
//! `max_attempts` retries have been handed out.

use std::time::Duration;

use crate::models::PacingConfig;

/// Backoff policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// First retry delay
    pub base: Duration,
    /// Maximum cumulative wait across all retries
    pub max_total: Duration,
    /// Maximum number of retries
    pub max_attempts: u32,
}

impl From<&PacingConfig> for BackoffConfig {
    fn from(pacing: &PacingConfig) -> Self {
        Self {
            base: pacing.backoff_base(),
            max_total: pacing.backoff_max(),
            max_attempts: pacing.max_retries,
        }
    }
}

/// Retry state for a single request.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    next: Duration,
    waited: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            next: config.base,
            waited: Duration::ZERO,
            attempts: 0,
        }
    }

    /// Delay before the next retry, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }

        let delay = self.next;
        let waited = self.waited.checked_add(delay)?;
        if waited > self.config.max_total {
            return None;
        }

        self.waited = waited;
        self.attempts += 1;
        self.next = delay.saturating_mul(2);
        Some(delay)
    }

    /// Retries handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Cumulative wait handed out so far.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}
