//! Retry policy for upstream requests

use crate::config::RetryConfig;
use std::time::Duration;

/// Bounded retry policy with capped exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Wait after the first failed attempt, before jitter
    pub initial_delay: Duration,

    /// Ceiling on the pre-jitter wait
    pub max_delay: Duration,

    /// Growth factor between consecutive waits
    pub multiplier: f64,

    /// Budget for all attempts of one request, measured from the first attempt
    pub max_total_time: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            max_total_time: Duration::from_millis(config.max_total_time_ms),
        }
    }

    /// Pre-jitter wait after the given failed attempt (1-based)
    ///
    /// `min(initial_delay * multiplier^(attempt - 1), max_delay)`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());

        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Wait after the given failed attempt with equal jitter applied
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        equal_jitter(self.base_delay(attempt), fastrand::f64())
    }
}

/// Equal jitter: half of `base` plus a uniformly random share of the other half
///
/// `random` is expected in `[0, 1)` and is clamped into `[0, 1]`.
pub fn equal_jitter(base: Duration, random: f64) -> Duration {
    let half = base / 2;
    half + half.mul_f64(random.clamp(0.0, 1.0))
}

/// Whether an upstream status is worth retrying
///
/// 429 and 5xx are transient. 403 is retried as well: the API answers 403 for
/// tokens it stopped accepting, and the retry runs with a refreshed token.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 403 | 429 | 500..=599)
}
