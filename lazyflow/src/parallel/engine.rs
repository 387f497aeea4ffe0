//! Bounded-concurrency dispatcher behind every parallel operator.
//!
//! The dispatcher runs as its own task. It pulls elements from the source, runs the worker
//! for each one on a [`JoinSet`] task and feeds results into a [`FeedableSequence`] that the
//! caller consumes. At most `concurrency` elements are in flight at any time, counting both
//! running workers and results parked in the [`ReorderBuffer`]. The dispatcher also stops
//! pulling while `concurrency` results sit undelivered in the feed, so a slow consumer paces
//! the source.
//!
//! The first failure closes the feed with that error. A panicking worker counts as a failure
//! of its own element. Workers still running are detached, never aborted.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::bail;
use crate::concurrency::feed::FeedableSequence;
use crate::error::{ErrorKind, SeqError, SeqResult};
use crate::parallel::reorder::ReorderBuffer;
use crate::seq_error;
use crate::sequence::{Sequence, start_on_first_poll};

/// Result of one worker. `None` drops the element from the output.
type WorkerResult<U> = SeqResult<Option<U>>;

/// Runs `worker` on every element with at most `concurrency` elements in flight.
///
/// With `keep_order` results are released in source order, otherwise in completion order.
/// Workers returning `Ok(None)` produce no output. Nothing runs until the returned sequence
/// is first pulled; dropping it stops dispatching.
///
/// Fails with [`ErrorKind::InvalidArgument`] if `concurrency` is zero.
pub fn parallel_feed<T, U, W, Fut>(
    sequence: Sequence<T>,
    concurrency: usize,
    keep_order: bool,
    worker: W,
) -> SeqResult<Sequence<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    W: FnMut(T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = WorkerResult<U>> + Send + 'static,
{
    if concurrency == 0 {
        bail!(
            ErrorKind::InvalidArgument,
            "Concurrency must be greater than 0"
        );
    }

    let feed = FeedableSequence::new();
    let output = feed.consume()?;

    let dispatcher = Dispatcher {
        source: sequence,
        feed,
        worker,
        concurrency,
        keep_order,
    };

    let output = start_on_first_poll(
        move || {
            tokio::spawn(dispatcher.run());
        },
        output.into_stream(),
    );

    Ok(Sequence::stream(output))
}

enum Event<T, U> {
    Joined(Result<(usize, WorkerResult<U>), tokio::task::JoinError>),
    Pulled(Option<SeqResult<T>>),
    Read,
}

struct Dispatcher<T, U, W> {
    source: Sequence<T>,
    feed: FeedableSequence<U>,
    worker: W,
    concurrency: usize,
    keep_order: bool,
}

impl<T, U, W, Fut> Dispatcher<T, U, W>
where
    T: Send + 'static,
    U: Send + 'static,
    W: FnMut(T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = WorkerResult<U>> + Send + 'static,
{
    async fn run(mut self) {
        let mut workers: JoinSet<(usize, WorkerResult<U>)> = JoinSet::new();
        let mut reorder = ReorderBuffer::new();
        let mut dispatched = 0usize;
        let mut exhausted = false;

        debug!(
            concurrency = self.concurrency,
            keep_order = self.keep_order,
            "starting parallel dispatcher"
        );

        loop {
            // Registered before inspecting the feed so that no read is missed.
            let read = self.feed.read();

            if self.feed.is_abandoned() {
                debug!(dispatched, "parallel output dropped, stopping dispatcher");
                workers.detach_all();
                return;
            }

            if exhausted && workers.is_empty() {
                self.feed.end();
                debug!(dispatched, "parallel dispatcher finished");
                return;
            }

            let in_flight = workers.len() + reorder.len();
            let backlogged = self.feed.buffer_size() >= self.concurrency;
            let can_dispatch = !exhausted && !backlogged && in_flight < self.concurrency;

            let event = tokio::select! {
                biased;

                Some(joined) = workers.join_next(), if !workers.is_empty() => Event::Joined(joined),
                item = self.source.next(), if can_dispatch => Event::Pulled(item),
                _ = read => Event::Read,
            };

            let keep_going = match event {
                Event::Joined(Ok((index, result))) => self.complete(index, result, &mut reorder),
                // Panics are caught inside the task; only a cancelled task ends up here.
                Event::Joined(Err(join_err)) => {
                    warn!(error = %join_err, "parallel worker did not complete");
                    self.fail(SeqError::from(join_err))
                }
                Event::Pulled(Some(Ok(item))) => {
                    let index = dispatched;
                    dispatched += 1;

                    match panic::catch_unwind(AssertUnwindSafe(|| (self.worker)(item, index))) {
                        Ok(work) => {
                            workers.spawn(async move {
                                let result = match AssertUnwindSafe(work).catch_unwind().await {
                                    Ok(result) => result,
                                    Err(payload) => Err(worker_panicked(index, payload)),
                                };

                                (index, result)
                            });

                            true
                        }
                        Err(payload) => {
                            let failed = Err(worker_panicked(index, payload));
                            self.complete(index, failed, &mut reorder)
                        }
                    }
                }
                Event::Pulled(Some(Err(err))) => {
                    // The source failure takes the position of the next element.
                    exhausted = true;
                    self.complete(dispatched, Err(err), &mut reorder)
                }
                Event::Pulled(None) => {
                    exhausted = true;
                    true
                }
                Event::Read => true,
            };

            if !keep_going {
                workers.detach_all();
                return;
            }
        }
    }

    /// Records the result at `index` and delivers everything that became releasable.
    ///
    /// Returns `false` once a failure has been delivered.
    fn complete(
        &mut self,
        index: usize,
        result: WorkerResult<U>,
        reorder: &mut ReorderBuffer<WorkerResult<U>>,
    ) -> bool {
        if !self.keep_order {
            return self.deliver(result);
        }

        reorder.insert(index, result);
        while let Some(result) = reorder.pop_ready() {
            if !self.deliver(result) {
                return false;
            }
        }

        true
    }

    fn deliver(&self, result: WorkerResult<U>) -> bool {
        match result {
            Ok(Some(value)) => self.feed.feed(value).is_ok(),
            Ok(None) => true,
            Err(err) => self.fail(err),
        }
    }

    fn fail(&self, err: SeqError) -> bool {
        debug!(error = %err, "parallel operator failed, closing output");
        let _ = self.feed.throw(err);

        false
    }
}

/// Turns a caught worker panic into a [`ErrorKind::WorkerPanic`] error for element `index`.
fn worker_panicked(index: usize, payload: Box<dyn Any + Send>) -> SeqError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    warn!(index, panic = %message, "parallel worker panicked");

    seq_error!(
        ErrorKind::WorkerPanic,
        "Worker panicked",
        format!("worker for element {index} panicked: {message}")
    )
}
