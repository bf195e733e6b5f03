//! Transport-level reconnection policy with exponential backoff
//!
//! Governs how the connection supervisor re-dials a router after the link
//! drops when a connect was issued with `reconnect: true`.

use std::time::Duration;

/// Configuration for automatic reconnection behavior
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReconnectionPolicy {
    /// Maximum number of consecutive failed dials before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base interval in seconds for exponential backoff
    #[serde(default = "default_base_interval")]
    pub base_interval_secs: u32,

    /// Multiplier for exponential backoff (typically 2)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,

    /// Maximum interval in seconds (cap for exponential growth)
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: u32,
}

fn default_max_attempts() -> u32 {
    10
}
fn default_base_interval() -> u32 {
    1
}
fn default_backoff_multiplier() -> u32 {
    2
}
fn default_max_interval() -> u32 {
    30
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_interval_secs: default_base_interval(),
            backoff_multiplier: default_backoff_multiplier(),
            max_interval_secs: default_max_interval(),
        }
    }
}

impl ReconnectionPolicy {
    /// Validate the entire policy
    ///
    /// # Returns
    ///
    /// * `Ok(())` if all fields are valid
    /// * `Err(PolicyValidationError)` with the first validation error encountered
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.max_attempts < 1 || self.max_attempts > 100 {
            return Err(PolicyValidationError::InvalidMaxAttempts(self.max_attempts));
        }
        if self.base_interval_secs < 1 || self.base_interval_secs > 300 {
            return Err(PolicyValidationError::InvalidBaseInterval(
                self.base_interval_secs,
            ));
        }
        if self.backoff_multiplier < 1 || self.backoff_multiplier > 10 {
            return Err(PolicyValidationError::InvalidBackoffMultiplier(
                self.backoff_multiplier,
            ));
        }
        if self.max_interval_secs < self.base_interval_secs {
            return Err(PolicyValidationError::MaxIntervalLessThanBase(
                self.max_interval_secs,
                self.base_interval_secs,
            ));
        }
        Ok(())
    }

    /// Backoff before dial number `attempt` (1-indexed)
    ///
    /// Formula: base_interval × multiplier^(attempt-1), capped at max_interval
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = (self.backoff_multiplier as u64)
            .checked_pow(exponent)
            .unwrap_or(u64::MAX);
        let interval_secs = (self.base_interval_secs as u64).saturating_mul(factor);

        Duration::from_secs(interval_secs.min(self.max_interval_secs as u64))
    }
}

/// Validation errors for ReconnectionPolicy
#[derive(Debug, thiserror::Error)]
pub enum PolicyValidationError {
    #[error("max_attempts must be between 1 and 100, got: {0}")]
    InvalidMaxAttempts(u32),

    #[error("base_interval_secs must be between 1 and 300, got: {0}")]
    InvalidBaseInterval(u32),

    #[error("backoff_multiplier must be between 1 and 10, got: {0}")]
    InvalidBackoffMultiplier(u32),

    #[error("max_interval_secs ({0}) must be >= base_interval_secs ({1})")]
    MaxIntervalLessThanBase(u32, u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = ReconnectionPolicy {
            max_attempts: 5,
            base_interval_secs: 5,
            backoff_multiplier: 2,
            max_interval_secs: 60,
        };

        assert_eq!(policy.calculate_backoff(1), Duration::from_secs(5));
        assert_eq!(policy.calculate_backoff(2), Duration::from_secs(10));
        assert_eq!(policy.calculate_backoff(3), Duration::from_secs(20));
        assert_eq!(policy.calculate_backoff(4), Duration::from_secs(40));
        assert_eq!(policy.calculate_backoff(5), Duration::from_secs(60));
        assert_eq!(policy.calculate_backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_default_policy_is_valid() {
        assert!(ReconnectionPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_max_below_base_is_rejected() {
        let policy = ReconnectionPolicy {
            base_interval_secs: 10,
            max_interval_secs: 5,
            ..ReconnectionPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyValidationError::MaxIntervalLessThanBase(5, 10))
        ));
    }
}
