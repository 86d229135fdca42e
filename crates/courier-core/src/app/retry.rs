//! Retry policy: decides backoff delays for status writes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff.
///
/// delay = base_delay * multiplier^(attempts - 1)
///
/// Example with base_delay=100ms, multiplier=2.0:
/// - attempt 1 (first failure): 100ms
/// - attempt 2: 200ms
/// - attempt 3: 400ms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failure, in milliseconds.
    pub base_delay_ms: u64,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay before the next try, given how many attempts have failed (1-indexed).
    /// `attempts = 0` uses the base delay.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay().as_secs_f64();
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        // 大きすぎる値で from_secs_f64 が panic しないように丸める
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    }
}
