//! Backoff delay progression.
//!
//! [`BackoffHelper`] tracks the current delay of a [`BackoffConfig`] progression, sleeps for
//! it on request and advances it afterwards. The delay only grows, capped at
//! `maximum_delay_ms`, until [`BackoffHelper::reset`] restores the initial delay.

use lazyflow_config::shared::{BackoffConfig, BackoffStrategy};
use rand::Rng;
use std::time::Duration;
use tracing::trace;

use crate::concurrency::cancellation::CancellationToken;
use crate::concurrency::timer::{TimeoutOutcome, cancelable_timeout};
use crate::error::{ErrorKind, SeqResult};
use crate::seq_error;

/// Stateful helper computing and waiting out backoff delays.
#[derive(Debug, Clone)]
pub struct BackoffHelper {
    config: BackoffConfig,
    current_delay_ms: u64,
}

impl BackoffHelper {
    /// Creates a helper starting at the configured initial delay.
    ///
    /// Fails with [`ErrorKind::InvalidArgument`] if the configuration does not validate.
    pub fn new(config: BackoffConfig) -> SeqResult<Self> {
        config.validate().map_err(|err| {
            seq_error!(
                ErrorKind::InvalidArgument,
                "Invalid backoff configuration",
                detail = err.to_string(),
                source: err
            )
        })?;

        Ok(Self {
            current_delay_ms: config.initial_delay_ms,
            config,
        })
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Returns the delay the next [`BackoffHelper::backoff`] will wait, before jitter.
    pub fn current_delay(&self) -> Duration {
        Duration::from_millis(self.current_delay_ms)
    }

    /// Restores the initial delay.
    pub fn reset(&mut self) {
        self.current_delay_ms = self.config.initial_delay_ms;
    }

    /// Waits for the current delay, then advances the progression.
    ///
    /// The wait ends early when `token` is set. The progression advances either way.
    pub async fn backoff(&mut self, token: Option<&CancellationToken>) -> TimeoutOutcome {
        let delay = self.jittered_delay();
        trace!(delay_ms = delay.as_millis() as u64, "backing off");

        let outcome = cancelable_timeout(delay, token).await;
        self.advance();

        outcome
    }

    /// Advances the progression without waiting.
    pub fn advance(&mut self) {
        self.current_delay_ms = next_delay(
            self.config.strategy,
            self.current_delay_ms,
            self.config.increase,
            self.config.maximum_delay_ms,
        );
    }

    fn jittered_delay(&self) -> Duration {
        if self.config.jitter <= 0.0 {
            return self.current_delay();
        }

        let jitter_factor = rand::rng().random::<f64>() * self.config.jitter;
        let jittered_delay_ms = self.current_delay_ms as f64 * (1.0 + jitter_factor);

        Duration::from_millis(jittered_delay_ms as u64)
    }
}

/// Computes the delay following `current` under `strategy`, capped at `maximum`.
pub fn next_delay(strategy: BackoffStrategy, current: u64, increase: f64, maximum: u64) -> u64 {
    let next = match strategy {
        BackoffStrategy::Linear => current as f64 + increase,
        BackoffStrategy::Exponential => current as f64 * increase,
    };

    // Float to integer casts saturate.
    (next.round() as u64).min(maximum)
}
