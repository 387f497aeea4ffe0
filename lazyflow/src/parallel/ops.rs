use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use crate::combinators::drain;
use crate::error::SeqResult;
use crate::parallel::engine::parallel_feed;
use crate::sequence::Sequence;

/// Maps every element through `mapper` with at most `concurrency` mappers running.
pub fn parallel_map<T, U, F, Fut>(
    sequence: Sequence<T>,
    concurrency: usize,
    keep_order: bool,
    mut mapper: F,
) -> SeqResult<Sequence<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<U>> + Send + 'static,
{
    parallel_feed(sequence, concurrency, keep_order, move |item, index| {
        let mapped = mapper(item, index);
        async move { mapped.await.map(Some) }
    })
}

/// Keeps the elements for which `predicate` resolves to `true`.
pub fn parallel_filter<T, F, Fut>(
    sequence: Sequence<T>,
    concurrency: usize,
    keep_order: bool,
    mut predicate: F,
) -> SeqResult<Sequence<T>>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<bool>> + Send + 'static,
{
    parallel_feed(sequence, concurrency, keep_order, move |item, index| {
        let decision = predicate(&item, index);
        async move { Ok(decision.await?.then_some(item)) }
    })
}

/// Runs `action` on every element and passes the element through once it completes.
pub fn parallel_intercept<T, F, Fut>(
    sequence: Sequence<T>,
    concurrency: usize,
    keep_order: bool,
    mut action: F,
) -> SeqResult<Sequence<T>>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<()>> + Send + 'static,
{
    parallel_feed(sequence, concurrency, keep_order, move |item, index| {
        let intercepted = action(&item, index);
        async move {
            intercepted.await?;
            Ok(Some(item))
        }
    })
}

/// Runs `action` on every element and waits for all of them, failing with the first error.
pub async fn parallel_for_each<T, F, Fut>(
    sequence: Sequence<T>,
    concurrency: usize,
    mut action: F,
) -> SeqResult<()>
where
    T: Send + 'static,
    F: FnMut(T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<()>> + Send + 'static,
{
    let completed = parallel_feed(sequence, concurrency, false, move |item, index| {
        let performed = action(item, index);
        async move { performed.await.map(|()| None::<()>) }
    })?;

    drain(completed).await?;

    Ok(())
}

/// Groups elements by the key `selector` resolves for them.
///
/// Keys are computed concurrently while each group keeps its elements in source order.
pub async fn parallel_group<T, K, F, Fut>(
    sequence: Sequence<T>,
    concurrency: usize,
    mut selector: F,
) -> SeqResult<HashMap<K, Vec<T>>>
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    F: FnMut(&T, usize) -> Fut + Send + 'static,
    Fut: Future<Output = SeqResult<K>> + Send + 'static,
{
    let mut keyed = parallel_map(sequence, concurrency, true, move |item, index| {
        let key = selector(&item, index);
        async move { Ok((key.await?, item)) }
    })?;

    let mut groups: HashMap<K, Vec<T>> = HashMap::new();
    while let Some(entry) = keyed.next().await {
        let (key, item) = entry?;
        groups.entry(key).or_default().push(item);
    }

    Ok(groups)
}
