//! Per-element retries driven by a caller predicate.
//!
//! Every element is handed to an operation. When the operation fails, the predicate sees
//! the error, the element and its index and decides whether to run the operation again on
//! a clone of the element or to give up. Giving up either surfaces the error, ending the
//! sequence, or silently skips the element.

use futures::future;
use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::debug;

use crate::error::{SeqError, SeqResult};
use crate::sequence::Sequence;

/// What to do after an operation failed on an element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run the operation on the same element again.
    Retry,
    /// Stop retrying this element.
    GiveUp,
}

/// Runs `operation` on every element, retrying failures while `predicate` says so.
///
/// When the predicate gives up, the error is yielded if `fail_on_give_up` is set and the
/// element is skipped otherwise. The result keeps the mode of the input.
pub fn retry<T, U, P, F>(
    sequence: Sequence<T>,
    fail_on_give_up: bool,
    mut predicate: P,
    mut operation: F,
) -> Sequence<U>
where
    T: Clone + Send + 'static,
    U: Send + 'static,
    P: FnMut(&SeqError, &T, usize) -> RetryDecision + Send + 'static,
    F: FnMut(T, usize) -> SeqResult<U> + Send + 'static,
{
    let mut step = move |index: usize, item: SeqResult<T>| -> Option<SeqResult<U>> {
        let item = match item {
            Ok(item) => item,
            Err(err) => return Some(Err(err)),
        };

        loop {
            let err = match operation(item.clone(), index) {
                Ok(output) => return Some(Ok(output)),
                Err(err) => err,
            };

            match predicate(&err, &item, index) {
                RetryDecision::Retry => {
                    debug!(index, error = %err, "retrying element");
                }
                RetryDecision::GiveUp if fail_on_give_up => return Some(Err(err)),
                RetryDecision::GiveUp => {
                    debug!(index, error = %err, "giving up on element, skipping it");
                    return None;
                }
            }
        }
    };

    match sequence {
        Sequence::Sync(iter) => Sequence::sync(
            iter.enumerate()
                .filter_map(move |(index, item)| step(index, item)),
        ),
        Sequence::Async(stream) => Sequence::stream(
            stream
                .enumerate()
                .filter_map(move |(index, item)| future::ready(step(index, item))),
        ),
    }
}

struct RetryState<S, P, F> {
    source: S,
    predicate: P,
    operation: F,
    index: usize,
}

/// Asynchronous variant of [`retry`] where both the operation and the predicate return futures.
///
/// Always produces an asynchronous sequence.
pub fn retry_async<T, U, P, PFut, F, Fut>(
    sequence: Sequence<T>,
    fail_on_give_up: bool,
    predicate: P,
    operation: F,
) -> Sequence<U>
where
    T: Clone + Send + 'static,
    U: Send + 'static,
    P: FnMut(&SeqError, &T, usize) -> PFut + Send + 'static,
    PFut: Future<Output = RetryDecision> + Send + 'static,
    F: FnMut(T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<U>> + Send + 'static,
{
    let state = RetryState {
        source: sequence.into_stream(),
        predicate,
        operation,
        index: 0,
    };

    let retried = stream::unfold(state, move |mut state| async move {
        loop {
            let item = state.source.next().await?;
            let index = state.index;
            state.index += 1;

            let item = match item {
                Ok(item) => item,
                Err(err) => return Some((Err(err), state)),
            };

            loop {
                let err = match (state.operation)(item.clone(), index).await {
                    Ok(output) => return Some((Ok(output), state)),
                    Err(err) => err,
                };

                match (state.predicate)(&err, &item, index).await {
                    RetryDecision::Retry => {
                        debug!(index, error = %err, "retrying element");
                    }
                    RetryDecision::GiveUp if fail_on_give_up => {
                        return Some((Err(err), state));
                    }
                    RetryDecision::GiveUp => {
                        debug!(index, error = %err, "giving up on element, skipping it");
                        break;
                    }
                }
            }
        }
    });

    Sequence::stream(retried)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::to_vec;
    use crate::error::ErrorKind;
    use crate::seq_error;
    use crate::sequence::Mode;
    use std::sync::{Arc, Mutex};

    /// Operation failing the first `failures` attempts on element 2.
    fn flaky(
        failures: usize,
        attempts: Arc<Mutex<Vec<i64>>>,
    ) -> impl FnMut(i64, usize) -> SeqResult<i64> + Send + 'static {
        let mut failed = 0;
        move |item, _| {
            attempts.lock().unwrap().push(item);
            if item == 2 && failed < failures {
                failed += 1;
                return Err(seq_error!(ErrorKind::OperationFailed, "flaky operation"));
            }
            Ok(item)
        }
    }

    #[tokio::test]
    async fn retried_element_is_yielded_once() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let mut decisions = vec![RetryDecision::Retry, RetryDecision::GiveUp].into_iter();

        let retried = retry(
            Sequence::range(1, 3),
            false,
            move |_, _, _| decisions.next().unwrap_or(RetryDecision::GiveUp),
            flaky(1, attempts.clone()),
        );

        assert_eq!(retried.mode(), Mode::Sync);
        assert_eq!(to_vec(retried).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(*attempts.lock().unwrap(), vec![1, 2, 2, 3]);
    }

    #[tokio::test]
    async fn give_up_skips_or_fails() {
        let skipped = retry(
            Sequence::range(1, 3),
            false,
            |_, _, _| RetryDecision::GiveUp,
            flaky(1, Arc::default()),
        );
        assert_eq!(to_vec(skipped).await.unwrap(), vec![1, 3]);

        let mut failed = retry(
            Sequence::range(1, 3),
            true,
            |_, _, _| RetryDecision::GiveUp,
            flaky(1, Arc::default()),
        );
        assert_eq!(failed.next().await, Some(Ok(1)));
        let err = failed.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert_eq!(failed.next().await, None);
    }

    #[tokio::test]
    async fn retry_async_passes_index_to_predicate() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let mut operation = flaky(2, Arc::default());

        let retried = retry_async(
            Sequence::range(1, 3),
            true,
            move |_, item, index| {
                recorder.lock().unwrap().push((*item, index));
                async { RetryDecision::Retry }
            },
            move |item, index| {
                let result = operation(item, index);
                async move { result }
            },
        );

        assert_eq!(retried.mode(), Mode::Async);
        assert_eq!(to_vec(retried).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(*seen.lock().unwrap(), vec![(2, 1), (2, 1)]);
    }
}
