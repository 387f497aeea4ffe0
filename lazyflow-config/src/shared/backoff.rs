use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// How the delay grows between two consecutive backoffs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `next = min(current + increase, maximum)`.
    Linear,
    /// `next = min(current * increase, maximum)`.
    Exponential,
}

/// Configuration of a backoff delay progression.
///
/// Used by poll loops and queue consumers that back off while there is nothing to do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackoffConfig {
    /// Growth strategy.
    ///
    /// Default: exponential
    #[serde(default = "default_strategy")]
    pub strategy: BackoffStrategy,

    /// Delay of the first backoff and the value restored by a reset.
    ///
    /// Default: 100ms
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Milliseconds added per step (linear) or factor applied per step (exponential).
    ///
    /// Default: 2.0
    #[serde(default = "default_increase")]
    pub increase: f64,

    /// Upper bound of the delay.
    ///
    /// Default: 5000ms
    #[serde(default = "default_maximum_delay_ms")]
    pub maximum_delay_ms: u64,

    /// Fraction of the current delay added at random to each sleep, between 0 and 1.
    ///
    /// The progression itself is not affected.
    /// Default: 0.0
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl BackoffConfig {
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

    pub const DEFAULT_INCREASE: f64 = 2.0;

    pub const DEFAULT_MAXIMUM_DELAY_MS: u64 = 5000;

    /// Creates an exponential configuration without jitter.
    pub fn exponential(initial_delay_ms: u64, increase: f64, maximum_delay_ms: u64) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            initial_delay_ms,
            increase,
            maximum_delay_ms,
            jitter: 0.0,
        }
    }

    /// Creates a linear configuration without jitter.
    pub fn linear(initial_delay_ms: u64, increase_ms: u64, maximum_delay_ms: u64) -> Self {
        Self {
            strategy: BackoffStrategy::Linear,
            initial_delay_ms,
            increase: increase_ms as f64,
            maximum_delay_ms,
            jitter: 0.0,
        }
    }

    /// Returns a copy of this configuration using the given jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the initial delay as a Duration.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the maximum delay as a Duration.
    pub fn maximum_delay(&self) -> Duration {
        Duration::from_millis(self.maximum_delay_ms)
    }

    /// Validates the delay bounds, growth factor and jitter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_delay_ms == 0 {
            return Err(ValidationError::invalid(
                "backoff.initial_delay_ms",
                "must be greater than 0",
            ));
        }

        if self.maximum_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::invalid(
                "backoff.maximum_delay_ms",
                "must be greater than or equal to `initial_delay_ms`",
            ));
        }

        if !self.increase.is_finite() || self.increase <= 0.0 {
            return Err(ValidationError::invalid(
                "backoff.increase",
                "must be a finite number greater than 0",
            ));
        }

        if self.strategy == BackoffStrategy::Exponential && self.increase < 1.0 {
            return Err(ValidationError::invalid(
                "backoff.increase",
                "must be at least 1 for the exponential strategy",
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ValidationError::invalid(
                "backoff.jitter",
                "must be between 0 and 1",
            ));
        }

        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            initial_delay_ms: default_initial_delay_ms(),
            increase: default_increase(),
            maximum_delay_ms: default_maximum_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_strategy() -> BackoffStrategy {
    BackoffStrategy::Exponential
}

fn default_initial_delay_ms() -> u64 {
    BackoffConfig::DEFAULT_INITIAL_DELAY_MS
}

fn default_increase() -> f64 {
    BackoffConfig::DEFAULT_INCREASE
}

fn default_maximum_delay_ms() -> u64 {
    BackoffConfig::DEFAULT_MAXIMUM_DELAY_MS
}

fn default_jitter() -> f64 {
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BackoffConfig::default();
        assert_eq!(config.strategy, BackoffStrategy::Exponential);
        assert_eq!(config.initial_delay_ms, 100);
        assert_eq!(config.increase, 2.0);
        assert_eq!(config.maximum_delay_ms, 5000);
        assert_eq!(config.jitter, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: BackoffConfig =
            serde_json::from_str(r#"{"strategy": "linear", "increase": 50}"#).unwrap();

        assert_eq!(config.strategy, BackoffStrategy::Linear);
        assert_eq!(config.increase, 50.0);
        assert_eq!(config.initial_delay_ms, 100);
        assert_eq!(config.maximum_delay_ms, 5000);
    }

    #[test]
    fn test_validate_zero_initial_delay() {
        let config = BackoffConfig {
            initial_delay_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_maximum_below_initial() {
        let config = BackoffConfig::exponential(1_000, 2.0, 500);
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue {
                field: "backoff.maximum_delay_ms".to_string(),
                constraint: "must be greater than or equal to `initial_delay_ms`".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_shrinking_exponential() {
        let config = BackoffConfig::exponential(100, 0.5, 5000);
        assert!(config.validate().is_err());

        // A linear step below one millisecond is odd but still grows.
        let config = BackoffConfig {
            strategy: BackoffStrategy::Linear,
            increase: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_jitter_out_of_range() {
        let config = BackoffConfig::default().with_jitter(1.5);
        assert!(config.validate().is_err());

        let config = BackoffConfig::default().with_jitter(0.25);
        assert!(config.validate().is_ok());
    }
}
