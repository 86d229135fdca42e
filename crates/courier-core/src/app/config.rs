//! PubSubConfig - 実行時設定
//!
//! JSON から読み込める。欠けているフィールドはデフォルト値になる。
//!
//! ```json
//! {
//!   "idle_timeout_ms": 180000,
//!   "orphan_policy": "leave_pending",
//!   "status_write": { "mode": "retry", "max_attempts": 5,
//!                     "backoff": { "base_delay_ms": 100, "multiplier": 2.0 } }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;

/// Safety poll period while idle (3 minutes).
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 3 * 60 * 1000;

/// What the dispatcher does with a Pending message it cannot deliver:
/// its subscriber is gone, or now listens to a different topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Leave the message Pending. It is reconsidered on the next wake
    /// (publish or subscribe) or idle timeout, and is delivered once its
    /// subscriber is registered on the message's topic again. A subscriber
    /// switching its own topic back does not wake the dispatcher.
    #[default]
    LeavePending,

    /// Mark the message Error (terminal).
    MarkError,
}

/// How the dispatcher reacts when the store rejects a status write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StatusWritePolicy {
    /// The first failed write halts the dispatcher.
    Fatal,

    /// Retry with exponential backoff; halt after `max_attempts` failed writes.
    /// `NotFound` is never retried.
    Retry {
        max_attempts: u32,
        #[serde(default)]
        backoff: RetryPolicy,
    },
}

impl Default for StatusWritePolicy {
    fn default() -> Self {
        StatusWritePolicy::Retry {
            max_attempts: 5,
            backoff: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    pub idle_timeout_ms: u64,
    pub orphan_policy: OrphanPolicy,
    pub status_write: StatusWritePolicy,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            orphan_policy: OrphanPolicy::default(),
            status_write: StatusWritePolicy::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl PubSubConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "idle_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if let StatusWritePolicy::Retry {
            max_attempts,
            backoff,
        } = &self.status_write
        {
            if *max_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "status_write.max_attempts must be at least 1".to_string(),
                ));
            }
            if backoff.multiplier.is_nan() || backoff.multiplier < 1.0 {
                return Err(ConfigError::Invalid(
                    "status_write.backoff.multiplier must be >= 1.0".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn with_status_write(mut self, policy: StatusWritePolicy) -> Self {
        self.status_write = policy;
        self
    }
}
