//! Retry configuration and exponential backoff math
//!
//! The delay computation is pure so it can be tested without a runtime;
//! the actual sleep between attempts lives in the executor's attempt loop.

use std::time::Duration;

/// Configuration for bounded retry with exponential backoff.
/// Immutable per call; pass a fresh value to change behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (≥ 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt (> 1.0 for exponential growth)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff delay after the given 1-indexed attempt:
    /// `min(initial_delay * multiplier^(attempt - 1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_multiplier.powi(exponent.min(i32::MAX as u32) as i32);
        // Clamp in f64 space first: the product can overflow Duration
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence_doubles_then_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            backoff_multiplier: 2.0,
        };

        let delays: Vec<u64> = (1..=7)
            .map(|attempt| config.delay_for(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 2000, 2000]);
    }

    #[test]
    fn test_first_delay_is_initial_delay() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
    }

    #[test]
    fn test_huge_attempt_numbers_stay_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(10_000), config.max_delay);
    }
}
