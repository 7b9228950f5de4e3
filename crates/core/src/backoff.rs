//! Reconnect backoff policy.
//!
//! An explicit policy instead of a bare retry-every-5-seconds loop, so
//! deployments can pick fixed or exponential delays and cap the number of
//! attempts. Default: fixed 5 second delay, never give up.

use std::time::Duration;

/// Delay schedule for connection retries.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Multiplier applied per attempt; 1.0 means a fixed delay.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Give up after this many attempts; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl Backoff {
    /// Fixed delay between attempts, retrying forever.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts: None,
        }
    }

    /// Exponential backoff capped at `max_delay`, retrying forever.
    pub fn exponential(initial: Duration, max_delay: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max_delay,
            max_attempts: None,
        }
    }

    /// Caps the number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Delay to sleep after the failed attempt number `attempt` (0-based),
    /// or `None` when the policy says to stop retrying.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt + 1 >= max {
                return None;
            }
        }
        // Clamp the exponent; beyond ~2^32 the cap applies anyway and an
        // unclamped power would overflow mul_f64 in a long outage.
        let factor = self.multiplier.powi(attempt.min(32) as i32);
        let delay = self.initial.mul_f64(factor);
        Some(delay.min(self.max_delay))
    }
}
