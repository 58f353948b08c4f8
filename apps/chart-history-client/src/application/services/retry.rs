//! Retry Policy
//!
//! Bounds the number of fetch attempts and paces them. Each failed attempt
//! asks the policy for the delay before the next one; `None` means the
//! bound is reached.

use std::time::Duration;

/// Configuration for fetch retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl RetryConfig {
    /// Fixed-delay configuration.
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Tracks attempts for one fetch.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    failures: u32,
}

impl RetryPolicy {
    /// Create a policy for a new fetch.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Record a failed attempt and return the delay before the next one.
    ///
    /// Returns `None` once `max_attempts` attempts have failed.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.config.max_attempts {
            return None;
        }

        Some(self.config.delay)
    }

    /// Number of attempts that have failed so far.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Attempt number (1-based) of the attempt about to run.
    #[must_use]
    pub const fn current_attempt(&self) -> u32 {
        self.failures + 1
    }

    /// Configured attempt bound.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}
