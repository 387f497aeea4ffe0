//! Element-wise transformations.
//!
//! Combinators taking a synchronous step function preserve the mode of their input: a
//! synchronous sequence stays synchronous. The `_async` variants accept a step function
//! returning a future and always produce an asynchronous sequence.
//!
//! Step functions receive the zero-based index of the element in the input sequence.

use futures::future;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;

use crate::error::{ErrorKind, SeqResult};
use crate::seq_error;
use crate::sequence::Sequence;

/// Applies `mapper` to every element.
pub fn map<T, U, F>(sequence: Sequence<T>, mut mapper: F) -> Sequence<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T, usize) -> SeqResult<U> + Send + 'static,
{
    match sequence {
        Sequence::Sync(iter) => Sequence::sync(
            iter.enumerate()
                .map(move |(index, item)| item.and_then(|item| mapper(item, index))),
        ),
        Sequence::Async(stream) => Sequence::stream(
            stream
                .enumerate()
                .map(move |(index, item)| item.and_then(|item| mapper(item, index))),
        ),
    }
}

/// Applies the asynchronous `mapper` to every element, one element at a time.
pub fn map_async<T, U, F, Fut>(sequence: Sequence<T>, mut mapper: F) -> Sequence<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<U>> + Send + 'static,
{
    let stream = sequence
        .into_stream()
        .enumerate()
        .then(move |(index, item)| {
            let pending = item.map(|item| mapper(item, index));

            async move {
                match pending {
                    Ok(mapped) => mapped.await,
                    Err(err) => Err(err),
                }
            }
        });

    Sequence::stream(stream)
}

/// Keeps elements accepted by `predicate`. Source and predicate errors pass through.
fn predicate_step<T, F>(
    item: SeqResult<T>,
    index: usize,
    predicate: &mut F,
) -> Option<SeqResult<T>>
where
    F: FnMut(&T, usize) -> SeqResult<bool>,
{
    match item {
        Ok(item) => match predicate(&item, index) {
            Ok(true) => Some(Ok(item)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        },
        Err(err) => Some(Err(err)),
    }
}

/// Keeps the elements for which `predicate` returns `true`.
pub fn filter<T, F>(sequence: Sequence<T>, mut predicate: F) -> Sequence<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> SeqResult<bool> + Send + 'static,
{
    match sequence {
        Sequence::Sync(iter) => Sequence::sync(
            iter.enumerate()
                .filter_map(move |(index, item)| predicate_step(item, index, &mut predicate)),
        ),
        Sequence::Async(stream) => Sequence::stream(stream.enumerate().filter_map(
            move |(index, item)| future::ready(predicate_step(item, index, &mut predicate)),
        )),
    }
}

/// Keeps the elements for which the asynchronous `predicate` resolves to `true`.
pub fn filter_async<T, F, Fut>(sequence: Sequence<T>, mut predicate: F) -> Sequence<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<bool>> + Send + 'static,
{
    let stream = sequence
        .into_stream()
        .enumerate()
        .filter_map(move |(index, item)| {
            let pending = item.map(|item| {
                let decision = predicate(&item, index);
                (item, decision)
            });

            async move {
                match pending {
                    Ok((item, decision)) => match decision.await {
                        Ok(true) => Some(Ok(item)),
                        Ok(false) => None,
                        Err(err) => Some(Err(err)),
                    },
                    Err(err) => Some(Err(err)),
                }
            }
        });

    Sequence::stream(stream)
}

/// Runs `interceptor` on every element and yields the element unchanged.
pub fn intercept<T, F>(sequence: Sequence<T>, mut interceptor: F) -> Sequence<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> SeqResult<()> + Send + 'static,
{
    map(sequence, move |item, index| {
        interceptor(&item, index)?;
        Ok(item)
    })
}

/// Runs the asynchronous `interceptor` on every element and yields the element unchanged.
pub fn intercept_async<T, F, Fut>(sequence: Sequence<T>, mut interceptor: F) -> Sequence<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<()>> + Send + 'static,
{
    map_async(sequence, move |item, index| {
        let intercepted = interceptor(&item, index);

        async move {
            intercepted.await?;
            Ok(item)
        }
    })
}

/// Maps every element to a collection and yields the collections' elements in order.
pub fn map_many<T, U, I, F>(sequence: Sequence<T>, mut mapper: F) -> Sequence<U>
where
    T: Send + 'static,
    U: Send + 'static,
    I: IntoIterator<Item = U>,
    I::IntoIter: Send + 'static,
    F: FnMut(T, usize) -> SeqResult<I> + Send + 'static,
{
    match sequence {
        Sequence::Sync(iter) => Sequence::sync(iter.enumerate().flat_map(
            move |(index, item)| -> Box<dyn Iterator<Item = SeqResult<U>> + Send> {
                match item.and_then(|item| mapper(item, index)) {
                    Ok(items) => Box::new(items.into_iter().map(Ok)),
                    Err(err) => Box::new(std::iter::once(Err(err))),
                }
            },
        )),
        Sequence::Async(stream) => {
            Sequence::stream(stream.enumerate().flat_map(move |(index, item)| {
                match item.and_then(|item| mapper(item, index)) {
                    Ok(items) => stream::iter(items.into_iter().map(Ok)).left_stream(),
                    Err(err) => stream::once(future::ready(Err(err))).right_stream(),
                }
            }))
        }
    }
}

/// Maps every element to a sequence, resolved asynchronously, and flattens the results.
pub fn map_many_async<T, U, F, Fut>(sequence: Sequence<T>, mut mapper: F) -> Sequence<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<Sequence<U>>> + Send + 'static,
{
    let stream = sequence
        .into_stream()
        .enumerate()
        .then(move |(index, item)| {
            let pending = item.map(|item| mapper(item, index));

            async move {
                match pending {
                    Ok(inner) => inner.await,
                    Err(err) => Err(err),
                }
            }
        })
        .flat_map(|inner| match inner {
            Ok(inner) => inner.into_stream().left_stream(),
            Err(err) => stream::once(future::ready(Err(err))).right_stream(),
        });

    Sequence::stream(stream)
}

/// Yields at most the first `count` elements.
pub fn take<T>(sequence: Sequence<T>, count: usize) -> Sequence<T>
where
    T: Send + 'static,
{
    match sequence {
        Sequence::Sync(iter) => Sequence::sync(iter.take(count)),
        Sequence::Async(stream) => Sequence::stream(stream.take(count)),
    }
}

/// Drops the first `count` elements. Errors are never skipped.
pub fn skip<T>(sequence: Sequence<T>, count: usize) -> Sequence<T>
where
    T: Send + 'static,
{
    let mut remaining = count;
    let mut step = move |item: SeqResult<T>| match item {
        Ok(_) if remaining > 0 => {
            remaining -= 1;
            None
        }
        item => Some(item),
    };

    match sequence {
        Sequence::Sync(iter) => Sequence::sync(iter.filter_map(step)),
        Sequence::Async(stream) => {
            Sequence::stream(stream.filter_map(move |item| future::ready(step(item))))
        }
    }
}

/// Yields elements while `predicate` holds and ends at the first element for which it does not.
pub fn take_while<T, F>(sequence: Sequence<T>, mut predicate: F) -> Sequence<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> SeqResult<bool> + Send + 'static,
{
    match sequence {
        Sequence::Sync(iter) => Sequence::sync(
            iter.enumerate()
                .map_while(move |(index, item)| predicate_step(item, index, &mut predicate)),
        ),
        Sequence::Async(stream) => {
            Sequence::stream(stream.enumerate().scan((), move |_, (index, item)| {
                future::ready(predicate_step(item, index, &mut predicate))
            }))
        }
    }
}

/// Fails with [`ErrorKind::AssertionFailed`] at the first element not satisfying `predicate`.
pub fn assert<T, F>(sequence: Sequence<T>, mut predicate: F) -> Sequence<T>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> SeqResult<bool> + Send + 'static,
{
    map(sequence, move |item, index| {
        if predicate(&item, index)? {
            Ok(item)
        } else {
            Err(seq_error!(
                ErrorKind::AssertionFailed,
                "Sequence assertion failed",
                format!("element at index {index} did not satisfy the assertion")
            ))
        }
    })
}

/// Yields only the first element for every key returned by `selector`.
pub fn distinct<T, K, F>(sequence: Sequence<T>, mut selector: F) -> Sequence<T>
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    F: FnMut(&T) -> K + Send + 'static,
{
    let mut seen = HashSet::new();
    filter(sequence, move |item, _| Ok(seen.insert(selector(item))))
}

/// Yields every element together with its predecessor, starting with the second element.
pub fn pairwise<T>(sequence: Sequence<T>) -> Sequence<(T, T)>
where
    T: Clone + Send + 'static,
{
    let mut previous: Option<T> = None;
    let mut step = move |item: SeqResult<T>| match item {
        Ok(item) => previous
            .replace(item.clone())
            .map(|previous| Ok((previous, item))),
        Err(err) => Some(Err(err)),
    };

    match sequence {
        Sequence::Sync(iter) => Sequence::sync(iter.filter_map(step)),
        Sequence::Async(stream) => {
            Sequence::stream(stream.filter_map(move |item| future::ready(step(item))))
        }
    }
}

/// Yields all elements of `first`, then all elements of `second`.
///
/// The result is synchronous only if both inputs are.
pub fn concat<T>(first: Sequence<T>, second: Sequence<T>) -> Sequence<T>
where
    T: Send + 'static,
{
    match (first, second) {
        (Sequence::Sync(first), Sequence::Sync(second)) => Sequence::sync(first.chain(second)),
        (first, second) => Sequence::stream(first.into_stream().chain(second.into_stream())),
    }
}

/// Yields `default` if the sequence ends without yielding anything.
pub fn default_if_empty<T>(sequence: Sequence<T>, default: T) -> Sequence<T>
where
    T: Send + 'static,
{
    let mut step = {
        let mut default = Some(default);
        let mut yielded = false;

        move |item: Option<SeqResult<T>>| match item {
            Some(item) => {
                yielded = true;
                Some(item)
            }
            None if !yielded => default.take().map(Ok),
            None => None,
        }
    };

    match sequence {
        Sequence::Sync(iter) => Sequence::sync(
            iter.map(Some)
                .chain(std::iter::once(None))
                .map_while(move |item| step(item)),
        ),
        Sequence::Async(stream) => Sequence::stream(
            stream
                .map(Some)
                .chain(stream::once(future::ready(None)))
                .scan((), move |_, item| future::ready(step(item))),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::to_vec;
    use crate::sequence::Mode;

    fn failing(at: usize) -> Sequence<usize> {
        Sequence::from_results((0..5).map(move |value| {
            if value == at {
                Err(seq_error!(ErrorKind::SourceFailed, "source failed"))
            } else {
                Ok(value)
            }
        }))
    }

    #[tokio::test]
    async fn map_preserves_mode_and_passes_indices() {
        let mapped = map(Sequence::from_iter(vec!['a', 'b']), |item, index| {
            Ok(format!("{item}{index}"))
        });
        assert_eq!(mapped.mode(), Mode::Sync);
        assert_eq!(to_vec(mapped).await.unwrap(), vec!["a0", "b1"]);

        let mapped = map(Sequence::range(1, 3).into_async(), |item, _| Ok(item * 10));
        assert_eq!(mapped.mode(), Mode::Async);
        assert_eq!(to_vec(mapped).await.unwrap(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn map_async_always_produces_async() {
        let mapped = map_async(Sequence::range(1, 3), |item, _| async move { Ok(item + 1) });

        assert_eq!(mapped.mode(), Mode::Async);
        assert_eq!(to_vec(mapped).await.unwrap(), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn mapper_errors_end_the_sequence() {
        let mut mapped = map(Sequence::range(1, 5), |item, _| {
            if item == 3 {
                Err(seq_error!(ErrorKind::OperationFailed, "bad item"))
            } else {
                Ok(item)
            }
        });

        assert_eq!(mapped.next().await, Some(Ok(1)));
        assert_eq!(mapped.next().await, Some(Ok(2)));
        assert!(matches!(mapped.next().await, Some(Err(_))));
        assert_eq!(mapped.next().await, None);
    }

    #[tokio::test]
    async fn filter_variants_keep_matching_elements() {
        let evens = filter(Sequence::range(1, 6), |item, _| Ok(item % 2 == 0));
        assert_eq!(to_vec(evens).await.unwrap(), vec![2, 4, 6]);

        let odd_indices = filter_async(Sequence::range(1, 6), |_, index| {
            let keep = index % 2 == 1;
            async move { Ok(keep) }
        });
        assert_eq!(to_vec(odd_indices).await.unwrap(), vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn intercept_yields_elements_unchanged() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let intercepted = intercept(Sequence::range(1, 3), move |item, _| {
            recorder.lock().unwrap().push(*item);
            Ok(())
        });

        assert_eq!(to_vec(intercepted).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn map_many_flattens_in_order() {
        let flattened = map_many(Sequence::range(1, 3), |item, _| Ok(vec![item; item as usize]));
        assert_eq!(flattened.mode(), Mode::Sync);
        assert_eq!(to_vec(flattened).await.unwrap(), vec![1, 2, 2, 3, 3, 3]);

        let flattened = map_many_async(Sequence::from_iter(vec![2, 0, 1]), |item, _| async move {
            Ok(Sequence::from_iter(0..item))
        });
        assert_eq!(to_vec(flattened).await.unwrap(), vec![0, 1, 0]);
    }

    #[tokio::test]
    async fn take_and_skip() {
        assert_eq!(to_vec(take(Sequence::range(1, 10), 3)).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(
            to_vec(skip(Sequence::range(1, 5).into_async(), 3)).await.unwrap(),
            vec![4, 5]
        );

        // Errors inside the skipped prefix still surface.
        let err = to_vec(skip(failing(1), 3)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceFailed);
    }

    #[tokio::test]
    async fn take_while_stops_at_first_mismatch() {
        let taken = take_while(Sequence::from_iter(vec![1, 2, 5, 1]), |item, _| Ok(*item < 3));
        assert_eq!(to_vec(taken).await.unwrap(), vec![1, 2]);

        let taken = take_while(Sequence::from_iter(vec![1, 2, 5, 1]).into_async(), |item, _| {
            Ok(*item < 3)
        });
        assert_eq!(to_vec(taken).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn assert_fails_on_violation() {
        let err = to_vec(assert(Sequence::range(1, 5), |item, _| Ok(*item < 4)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AssertionFailed);
        assert_eq!(
            err.detail(),
            Some("element at index 3 did not satisfy the assertion")
        );
    }

    #[tokio::test]
    async fn distinct_and_pairwise() {
        let unique = distinct(Sequence::from_iter(vec![1, 11, 2, 21, 3]), |item| item % 10);
        assert_eq!(to_vec(unique).await.unwrap(), vec![1, 2, 3]);

        let pairs = pairwise(Sequence::range(1, 4).into_async());
        assert_eq!(to_vec(pairs).await.unwrap(), vec![(1, 2), (2, 3), (3, 4)]);
    }

    #[tokio::test]
    async fn concat_mixes_modes() {
        let joined = concat(Sequence::range(1, 2), Sequence::range(3, 4));
        assert_eq!(joined.mode(), Mode::Sync);
        assert_eq!(to_vec(joined).await.unwrap(), vec![1, 2, 3, 4]);

        let joined = concat(Sequence::range(1, 2), Sequence::range(3, 4).into_async());
        assert_eq!(joined.mode(), Mode::Async);
        assert_eq!(to_vec(joined).await.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn default_if_empty_only_fills_empty_sequences() {
        let filled = default_if_empty(Sequence::<i32>::empty(), 7);
        assert_eq!(to_vec(filled).await.unwrap(), vec![7]);

        let untouched = default_if_empty(Sequence::from_iter(vec![1, 2]).into_async(), 7);
        assert_eq!(to_vec(untouched).await.unwrap(), vec![1, 2]);
    }
}
