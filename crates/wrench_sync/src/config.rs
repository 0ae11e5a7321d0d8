//! Configuration for the sync engine

use serde::{Deserialize, Serialize};
use std::time::Duration;
use wrench_config::Config;

/// Longest backoff a policy may ask for
pub const MAX_BACKOFF: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Retry limits and backoff curve
///
/// `delay(n) = min(base_delay * multiplier^(n-1), max_delay)` for the n-th retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Failures tolerated before a mutation is dropped
    pub max_retries: u32,

    pub base_delay: Duration,

    pub multiplier: f64,

    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5 * 60),
        }
    }
}

impl RetryPolicy {
    /// Wait before the `retries`-th retry
    pub fn delay(&self, retries: u32) -> Duration {
        let exponent = retries.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Configuration for the sync engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Storage key holding the pending mutation list
    pub queue_key: String,

    /// Storage key holding conflict records
    pub conflict_key: String,

    pub retry: RetryPolicy,

    /// Capacity of the event channel; slow subscribers miss the oldest events
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue_key: "offline-queue".to_string(),
            conflict_key: "offline-conflicts".to_string(),
            retry: RetryPolicy::default(),
            event_capacity: 64,
        }
    }
}

impl SyncConfig {
    /// Build from the workspace `.wrench/config.toml`
    pub fn from_workspace(config: &Config) -> Self {
        Self {
            queue_key: config.storage.queue_key.clone(),
            conflict_key: config.storage.conflict_key.clone(),
            retry: RetryPolicy {
                max_retries: config.retry.max_retries,
                base_delay: Duration::from_millis(config.retry.base_delay_ms),
                multiplier: config.retry.multiplier,
                max_delay: Duration::from_millis(config.retry.max_delay_ms),
            },
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.queue_key.is_empty() || self.conflict_key.is_empty() {
            return Err(crate::SyncError::Config("storage keys cannot be empty".to_string()));
        }
        if self.queue_key == self.conflict_key {
            return Err(crate::SyncError::Config(
                "queue_key and conflict_key must differ".to_string(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(crate::SyncError::Config("max_retries must be at least 1".to_string()));
        }
        if !(self.retry.multiplier >= 1.0) {
            return Err(crate::SyncError::Config("multiplier must be >= 1.0".to_string()));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(crate::SyncError::Config(
                "max_delay must not be shorter than base_delay".to_string(),
            ));
        }
        if self.retry.max_delay > MAX_BACKOFF {
            return Err(crate::SyncError::Config(format!(
                "max_delay must not exceed {}s",
                MAX_BACKOFF.as_secs()
            )));
        }
        if self.event_capacity == 0 {
            return Err(crate::SyncError::Config("event_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_curve() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(3),
        };

        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(3));
        assert_eq!(policy.delay(60), Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_huge_exponent_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SyncConfig::default().validate().is_ok());

        let same_keys = SyncConfig {
            conflict_key: "offline-queue".to_string(),
            ..Default::default()
        };
        assert!(same_keys.validate().is_err());

        let mut no_retries = SyncConfig::default();
        no_retries.retry.max_retries = 0;
        assert!(no_retries.validate().is_err());

        let mut shrinking = SyncConfig::default();
        shrinking.retry.multiplier = 0.5;
        assert!(shrinking.validate().is_err());

        let mut inverted = SyncConfig::default();
        inverted.retry.max_delay = Duration::from_millis(10);
        assert!(inverted.validate().is_err());

        let mut endless = SyncConfig::default();
        endless.retry.base_delay = Duration::from_millis(u64::MAX);
        endless.retry.max_delay = Duration::from_millis(u64::MAX);
        assert!(endless.validate().is_err());

        let mut week = SyncConfig::default();
        week.retry.max_delay = MAX_BACKOFF;
        assert!(week.validate().is_ok());
    }

    #[test]
    fn test_from_workspace_config() {
        let mut workspace = Config::with_root(std::path::Path::new("/srv/tech"));
        workspace.retry.max_retries = 3;
        workspace.retry.base_delay_ms = 250;
        workspace.storage.queue_key = "pending".to_string();

        let config = SyncConfig::from_workspace(&workspace);
        assert_eq!(config.queue_key, "pending");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }
}
