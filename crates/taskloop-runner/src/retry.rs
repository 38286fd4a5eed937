//! Retry policy for task attempts.
//!
//! Fixed delay between attempts, bounded total attempts.

use std::time::Duration;

/// How many times a task may be attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `3` means up to two retries.
    pub max_attempts: u32,

    /// Fixed delay before each retry.
    pub delay: Duration,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Up to `max_attempts` attempts with a fixed delay between them.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, no delay.
    fn default() -> Self {
        Self::fixed(3, Duration::ZERO)
    }
}
