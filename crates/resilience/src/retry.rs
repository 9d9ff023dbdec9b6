// crates/resilience/src/retry.rs
//! Exponential backoff schedule

use std::time::Duration;

/// Delay schedule for repeated attempts
///
/// Only computes delays; callers own the loop. The sync engine uses it to
/// space queue drain passes while items are still retrying.
///
/// The wait before attempt `n` is `initial * factor^(n - 1)`, capped at
/// `max`. Attempt 0 is the first try and never waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial: Duration,
    max: Duration,
    factor: u32,
    jitter: bool,
}

impl RetryPolicy {
    /// Doubling backoff from 500 ms up to 30 s, with jitter
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2,
            jitter: true,
        }
    }

    pub fn with_initial_delay(self, initial: Duration) -> Self {
        Self { initial, ..self }
    }

    pub fn with_max_delay(self, max: Duration) -> Self {
        Self { max, ..self }
    }

    /// Growth factor between consecutive delays; 1 gives a fixed interval
    pub fn with_factor(self, factor: u32) -> Self {
        Self {
            factor: factor.max(1),
            ..self
        }
    }

    pub fn with_jitter(self, jitter: bool) -> Self {
        Self { jitter, ..self }
    }

    /// Wait before `attempt`, where attempt 0 is the first try
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let Some(steps) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };

        let steps = u32::try_from(steps).unwrap_or(u32::MAX);
        let delay = self
            .initial
            .saturating_mul(self.factor.saturating_pow(steps))
            .min(self.max);

        if self.jitter {
            // Deterministic spread over [0.75, 0.95]
            delay.mul_f64(0.75 + (attempt % 5) as f64 * 0.05)
        } else {
            delay
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Whether the schedule permits another try after `attempts_made`
    pub fn allows_another(&self, attempts_made: usize) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
