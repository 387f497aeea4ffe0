//! Poll loops that back off while there is nothing to do.
//!
//! Two flavors share the same [`BackoffHelper`] progression:
//! - [`backoff_loop`] owns the loop and calls a poll function until cancelled. The function
//!   reports whether it made progress.
//! - [`backoff_generator`] hands the loop to the caller as a stream of [`BackoffSignal`]s.
//!   The caller does one unit of work per signal and calls [`BackoffSignal::backoff`] when
//!   the work turned out to be empty. The decision is applied when the next signal is pulled.

use futures::stream::{self, BoxStream, StreamExt};
use lazyflow_config::shared::BackoffConfig;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

use crate::concurrency::backoff::BackoffHelper;
use crate::concurrency::cancellation::{CancellationToken, ChildMode};
use crate::error::SeqResult;

/// What a single poll iteration achieved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Work was done. The backoff delay is reset.
    Progress,
    /// Nothing to do. The loop backs off before the next iteration.
    Idle,
}

/// Repeatedly invokes `poll` until `token` is set.
///
/// `poll` receives a child token linked to `token`. Setting that child from inside `poll`
/// ends the loop without affecting `token`. Idle iterations wait out the current backoff
/// delay, which ends early on cancellation; progress resets the delay.
///
/// The first error returned by `poll` ends the loop and is returned.
pub async fn backoff_loop<F, Fut>(
    config: BackoffConfig,
    token: &CancellationToken,
    mut poll: F,
) -> SeqResult<()>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = SeqResult<PollOutcome>>,
{
    let mut backoff = BackoffHelper::new(config)?;
    let loop_token = token.create_child(ChildMode::Linked);

    debug!(
        initial_delay_ms = backoff.config().initial_delay_ms,
        maximum_delay_ms = backoff.config().maximum_delay_ms,
        "starting backoff loop"
    );

    let mut iterations: u64 = 0;
    while !loop_token.is_set() {
        iterations += 1;

        match poll(loop_token.clone()).await {
            Ok(PollOutcome::Progress) => backoff.reset(),
            Ok(PollOutcome::Idle) => {
                backoff.backoff(Some(&loop_token)).await;
            }
            Err(err) => {
                error!(error = %err, iterations, "backoff loop iteration failed");
                return Err(err);
            }
        }
    }

    debug!(iterations, "backoff loop stopped");

    Ok(())
}

/// Flag handed out by [`backoff_generator`] for one iteration.
#[derive(Debug, Clone, Default)]
pub struct BackoffSignal {
    requested: Arc<AtomicBool>,
}

impl BackoffSignal {
    /// Marks the iteration as idle so the generator backs off before the next one.
    pub fn backoff(&self) {
        self.requested.store(true, Ordering::Release);
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

struct GeneratorState {
    backoff: BackoffHelper,
    token: CancellationToken,
    loop_token: CancellationToken,
    previous: Option<BackoffSignal>,
}

/// Returns a stream yielding one [`BackoffSignal`] per iteration until `token` is set.
///
/// Pulling the next signal first applies the decision of the previous iteration: back off
/// if [`BackoffSignal::backoff`] was called, reset the delay otherwise.
pub fn backoff_generator(
    config: BackoffConfig,
    token: &CancellationToken,
) -> SeqResult<BoxStream<'static, BackoffSignal>> {
    let state = GeneratorState {
        backoff: BackoffHelper::new(config)?,
        token: token.clone(),
        loop_token: token.create_child(ChildMode::Linked),
        previous: None,
    };

    let signals = stream::unfold(state, |mut state| async move {
        if let Some(previous) = state.previous.take() {
            if previous.is_requested() {
                state.backoff.backoff(Some(&state.loop_token)).await;
            } else {
                state.backoff.reset();
            }
        }

        if state.token.is_set() {
            debug!("backoff generator stopped");
            return None;
        }

        let signal = BackoffSignal::default();
        state.previous = Some(signal.clone());

        Some((signal, state))
    });

    Ok(signals.boxed())
}
