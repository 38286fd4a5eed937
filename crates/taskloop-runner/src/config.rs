//! Runner configuration.

use crate::error::ConfigurationError;
use crate::retry::RetryPolicy;

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Number of workers pulling from the queue.
    pub workers: usize,

    /// Retry policy applied to every task.
    pub retry: RetryPolicy,
}

impl RunnerConfig {
    /// Builder method to set the worker pool width.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builder method to set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.workers == 0 {
            return Err(ConfigurationError::ZeroWorkers);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::ZeroAttempts);
        }
        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_is_valid() {
        assert!(RunnerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let config = RunnerConfig::default().with_workers(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ZeroWorkers)
        ));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = RunnerConfig::default().with_retry(RetryPolicy::fixed(0, Duration::ZERO));
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ZeroAttempts)
        ));
    }
}
