//! Waits that can be cut short by a [`CancellationToken`].
//!
//! Both helpers race their wait against [`CancellationToken::cancelled`]. Cancellation
//! is reported as a value, never as an error, so callers decide what an early stop means.

use std::future::Future;
use std::time::Duration;

use crate::concurrency::cancellation::CancellationToken;

/// Result of a [`cancelable_timeout`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// The full duration elapsed.
    Elapsed,
    /// The token was set before the duration elapsed.
    Cancelled,
}

impl TimeoutOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TimeoutOutcome::Cancelled)
    }
}

/// Result of a [`cancelable`] future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cancelable<T> {
    /// The future completed with this output.
    Completed(T),
    /// The token was set first. The future was dropped.
    Cancelled,
}

impl<T> Cancelable<T> {
    /// Returns the output if the future completed.
    pub fn completed(self) -> Option<T> {
        match self {
            Cancelable::Completed(value) => Some(value),
            Cancelable::Cancelled => None,
        }
    }
}

/// Sleeps for `duration` unless `token` is set first.
///
/// An already set token returns [`TimeoutOutcome::Cancelled`] without sleeping.
pub async fn cancelable_timeout(
    duration: Duration,
    token: Option<&CancellationToken>,
) -> TimeoutOutcome {
    let Some(token) = token else {
        tokio::time::sleep(duration).await;
        return TimeoutOutcome::Elapsed;
    };

    if token.is_set() {
        return TimeoutOutcome::Cancelled;
    }

    tokio::select! {
        biased;

        _ = token.cancelled() => TimeoutOutcome::Cancelled,
        _ = tokio::time::sleep(duration) => TimeoutOutcome::Elapsed,
    }
}

/// Drives `future` to completion unless `token` is set first.
///
/// Errors produced by `future` are returned inside [`Cancelable::Completed`] untouched.
pub async fn cancelable<F>(future: F, token: &CancellationToken) -> Cancelable<F::Output>
where
    F: Future,
{
    if token.is_set() {
        return Cancelable::Cancelled;
    }

    tokio::select! {
        biased;

        _ = token.cancelled() => Cancelable::Cancelled,
        output = future => Cancelable::Completed(output),
    }
}
