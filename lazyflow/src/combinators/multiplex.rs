//! Fan-out of one sequence to several consumers.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::bail;
use crate::concurrency::feed::FeedableSequence;
use crate::error::{ErrorKind, SeqResult};
use crate::sequence::{Sequence, start_on_first_poll};

type PendingPump<T> = Arc<Mutex<Option<(Sequence<T>, Vec<FeedableSequence<T>>)>>>;

/// Splits `sequence` into `count` sequences that each observe every element.
///
/// A background task pulls the source and feeds a clone of every element to each output.
/// It starts when any output is first pulled. With a non-zero `buffer_size` the task waits
/// while an output holds `buffer_size` undelivered elements, so the slowest consumer paces
/// the source; zero leaves the outputs unbounded. Source errors are delivered to every
/// output. Outputs that are dropped stop receiving elements, and the task stops once all of
/// them are gone.
///
/// Fails with [`ErrorKind::InvalidArgument`] if `count` is zero.
pub fn multiplex<T>(
    sequence: Sequence<T>,
    count: usize,
    buffer_size: usize,
) -> SeqResult<Vec<Sequence<T>>>
where
    T: Clone + Send + 'static,
{
    if count == 0 {
        bail!(
            ErrorKind::InvalidArgument,
            "Multiplex count must be greater than 0"
        );
    }

    let feeds = (0..count)
        .map(|_| FeedableSequence::new())
        .collect::<Vec<_>>();
    let outputs = feeds
        .iter()
        .map(FeedableSequence::consume)
        .collect::<SeqResult<Vec<_>>>()?;

    let pending: PendingPump<T> = Arc::new(Mutex::new(Some((sequence, feeds))));

    let outputs = outputs
        .into_iter()
        .map(|output| {
            let pending = pending.clone();
            let start = move || {
                let pump = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some((source, feeds)) = pump {
                    tokio::spawn(pump_outputs(source, feeds, buffer_size));
                }
            };

            Sequence::stream(start_on_first_poll(start, output.into_stream()))
        })
        .collect();

    Ok(outputs)
}

async fn pump_outputs<T>(
    mut source: Sequence<T>,
    feeds: Vec<FeedableSequence<T>>,
    buffer_size: usize,
)
where
    T: Clone + Send + 'static,
{
    debug!(outputs = feeds.len(), buffer_size, "starting multiplex pump");

    loop {
        if buffer_size > 0 {
            for feed in &feeds {
                loop {
                    let read = feed.read();
                    if feed.is_abandoned() || feed.buffer_size() < buffer_size {
                        break;
                    }
                    read.await;
                }
            }
        }

        if feeds.iter().all(FeedableSequence::is_abandoned) {
            debug!("all multiplex outputs dropped, stopping pump");
            return;
        }

        match source.next().await {
            Some(Ok(item)) => {
                for feed in feeds.iter().filter(|feed| !feed.is_abandoned()) {
                    let _ = feed.feed(item.clone());
                }
            }
            Some(Err(err)) => {
                for feed in &feeds {
                    let _ = feed.throw(err.clone());
                }
                return;
            }
            None => {
                for feed in &feeds {
                    feed.end();
                }
                return;
            }
        }
    }
}
