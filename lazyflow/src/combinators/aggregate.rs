//! Terminal operations draining a sequence, plus ordering operators that need to see
//! every element before yielding the first one.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::hash::Hash;

use crate::bail;
use crate::error::{ErrorKind, SeqResult};
use crate::sequence::Sequence;

/// Collects every element into a vector.
pub async fn to_vec<T>(mut sequence: Sequence<T>) -> SeqResult<Vec<T>>
where
    T: Send + 'static,
{
    let mut items = Vec::new();
    while let Some(item) = sequence.next().await {
        items.push(item?);
    }

    Ok(items)
}

/// Pulls every element and discards it, returning the number of elements drained.
pub async fn drain<T>(mut sequence: Sequence<T>) -> SeqResult<usize>
where
    T: Send + 'static,
{
    let mut count = 0;
    while let Some(item) = sequence.next().await {
        item?;
        count += 1;
    }

    Ok(count)
}

/// Calls `action` for every element.
pub async fn for_each<T, F>(mut sequence: Sequence<T>, mut action: F) -> SeqResult<()>
where
    T: Send + 'static,
    F: FnMut(T, usize) -> SeqResult<()>,
{
    let mut index = 0;
    while let Some(item) = sequence.next().await {
        action(item?, index)?;
        index += 1;
    }

    Ok(())
}

/// Awaits `action` for every element, one element at a time.
pub async fn for_each_async<T, F, Fut>(mut sequence: Sequence<T>, mut action: F) -> SeqResult<()>
where
    T: Send + 'static,
    F: FnMut(T, usize) -> Fut,
    Fut: Future<Output = SeqResult<()>>,
{
    let mut index = 0;
    while let Some(item) = sequence.next().await {
        action(item?, index).await?;
        index += 1;
    }

    Ok(())
}

/// Folds every element into an accumulator starting at `initial`.
pub async fn reduce<T, U, F>(mut sequence: Sequence<T>, initial: U, mut reducer: F) -> SeqResult<U>
where
    T: Send + 'static,
    F: FnMut(U, T, usize) -> SeqResult<U>,
{
    let mut accumulator = initial;
    let mut index = 0;
    while let Some(item) = sequence.next().await {
        accumulator = reducer(accumulator, item?, index)?;
        index += 1;
    }

    Ok(accumulator)
}

/// Returns `true` as soon as an element satisfies `predicate`.
pub async fn any<T, F>(mut sequence: Sequence<T>, mut predicate: F) -> SeqResult<bool>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> SeqResult<bool>,
{
    let mut index = 0;
    while let Some(item) = sequence.next().await {
        if predicate(&item?, index)? {
            return Ok(true);
        }
        index += 1;
    }

    Ok(false)
}

/// Returns `false` as soon as an element does not satisfy `predicate`.
pub async fn all<T, F>(mut sequence: Sequence<T>, mut predicate: F) -> SeqResult<bool>
where
    T: Send + 'static,
    F: FnMut(&T, usize) -> SeqResult<bool>,
{
    let mut index = 0;
    while let Some(item) = sequence.next().await {
        if !predicate(&item?, index)? {
            return Ok(false);
        }
        index += 1;
    }

    Ok(true)
}

/// Returns the first element, failing with [`ErrorKind::EmptySequence`] if there is none.
pub async fn first<T>(sequence: Sequence<T>) -> SeqResult<T>
where
    T: Send + 'static,
{
    match first_or_none(sequence).await? {
        Some(item) => Ok(item),
        None => bail!(
            ErrorKind::EmptySequence,
            "Sequence contains no elements",
            "`first` requires at least one element"
        ),
    }
}

/// Returns the first element, or `default` if there is none.
pub async fn first_or_default<T>(sequence: Sequence<T>, default: T) -> SeqResult<T>
where
    T: Send + 'static,
{
    Ok(first_or_none(sequence).await?.unwrap_or(default))
}

async fn first_or_none<T>(mut sequence: Sequence<T>) -> SeqResult<Option<T>>
where
    T: Send + 'static,
{
    sequence.next().await.transpose()
}

/// Returns the last element, failing with [`ErrorKind::EmptySequence`] if there is none.
pub async fn last<T>(sequence: Sequence<T>) -> SeqResult<T>
where
    T: Send + 'static,
{
    match last_or_none(sequence).await? {
        Some(item) => Ok(item),
        None => bail!(
            ErrorKind::EmptySequence,
            "Sequence contains no elements",
            "`last` requires at least one element"
        ),
    }
}

/// Returns the last element, or `default` if there is none.
pub async fn last_or_default<T>(sequence: Sequence<T>, default: T) -> SeqResult<T>
where
    T: Send + 'static,
{
    Ok(last_or_none(sequence).await?.unwrap_or(default))
}

async fn last_or_none<T>(mut sequence: Sequence<T>) -> SeqResult<Option<T>>
where
    T: Send + 'static,
{
    let mut last = None;
    while let Some(item) = sequence.next().await {
        last = Some(item?);
    }

    Ok(last)
}

/// Returns the only element.
///
/// Fails with [`ErrorKind::EmptySequence`] if there is none and with
/// [`ErrorKind::MultipleElements`] if there is more than one.
pub async fn single<T>(sequence: Sequence<T>) -> SeqResult<T>
where
    T: Send + 'static,
{
    match single_or_none(sequence).await? {
        Some(item) => Ok(item),
        None => bail!(
            ErrorKind::EmptySequence,
            "Sequence contains no elements",
            "`single` requires exactly one element"
        ),
    }
}

/// Returns the only element, or `default` if there is none.
///
/// Fails with [`ErrorKind::MultipleElements`] if there is more than one.
pub async fn single_or_default<T>(sequence: Sequence<T>, default: T) -> SeqResult<T>
where
    T: Send + 'static,
{
    Ok(single_or_none(sequence).await?.unwrap_or(default))
}

async fn single_or_none<T>(mut sequence: Sequence<T>) -> SeqResult<Option<T>>
where
    T: Send + 'static,
{
    let Some(item) = sequence.next().await.transpose()? else {
        return Ok(None);
    };

    if sequence.next().await.transpose()?.is_some() {
        bail!(
            ErrorKind::MultipleElements,
            "Sequence contains more than one element"
        );
    }

    Ok(Some(item))
}

/// Groups elements by the key returned by `selector`.
///
/// Every group keeps its elements in sequence order.
pub async fn group<T, K, F>(
    mut sequence: Sequence<T>,
    mut selector: F,
) -> SeqResult<HashMap<K, Vec<T>>>
where
    T: Send + 'static,
    K: Eq + Hash,
    F: FnMut(&T, usize) -> SeqResult<K>,
{
    let mut groups: HashMap<K, Vec<T>> = HashMap::new();
    let mut index = 0;
    while let Some(item) = sequence.next().await {
        let item = item?;
        let key = selector(&item, index)?;
        groups.entry(key).or_default().push(item);
        index += 1;
    }

    Ok(groups)
}

/// Maps every element to its unique key.
///
/// Fails with [`ErrorKind::DuplicateGroupKey`] if two elements share a key.
pub async fn group_single<T, K, F>(
    mut sequence: Sequence<T>,
    mut selector: F,
) -> SeqResult<HashMap<K, T>>
where
    T: Send + 'static,
    K: Eq + Hash,
    F: FnMut(&T, usize) -> SeqResult<K>,
{
    let mut groups = HashMap::new();
    let mut index = 0;
    while let Some(item) = sequence.next().await {
        let item = item?;
        match groups.entry(selector(&item, index)?) {
            Entry::Occupied(_) => bail!(
                ErrorKind::DuplicateGroupKey,
                "Group has more than one element",
                format!("element at index {index} repeats an existing key")
            ),
            Entry::Vacant(entry) => {
                entry.insert(item);
            }
        }
        index += 1;
    }

    Ok(groups)
}

/// Drains the sequence into memory and returns a synchronous sequence over the elements.
///
/// Fails with the first error of the source.
pub async fn materialize<T>(sequence: Sequence<T>) -> SeqResult<Sequence<T>>
where
    T: Send + 'static,
{
    Ok(Sequence::from_iter(to_vec(sequence).await?))
}

/// Sorts the elements with `compare`.
///
/// Sorting is lazy and mode-preserving: the source is drained on the first pull. The sort
/// is stable.
pub fn sort_by<T, F>(sequence: Sequence<T>, mut compare: F) -> Sequence<T>
where
    T: Send + 'static,
    F: FnMut(&T, &T) -> Ordering + Send + 'static,
{
    match sequence {
        Sequence::Sync(iter) => {
            let mut source = Some(iter);
            let mut sorted: Option<std::vec::IntoIter<T>> = None;

            Sequence::sync(std::iter::from_fn(move || {
                if let Some(iter) = source.take() {
                    match iter.collect::<SeqResult<Vec<T>>>() {
                        Ok(mut items) => {
                            items.sort_by(&mut compare);
                            sorted = Some(items.into_iter());
                        }
                        Err(err) => return Some(Err(err)),
                    }
                }

                sorted.as_mut()?.next().map(Ok)
            }))
        }
        Sequence::Async(source) => {
            let sorted = stream::once(async move {
                match source.try_collect::<Vec<T>>().await {
                    Ok(mut items) => {
                        items.sort_by(&mut compare);
                        stream::iter(items.into_iter().map(Ok)).left_stream()
                    }
                    Err(err) => stream::once(futures::future::ready(Err(err))).right_stream(),
                }
            })
            .flatten();

            Sequence::stream(sorted)
        }
    }
}

/// Sorts the elements by their natural order.
pub fn sort<T>(sequence: Sequence<T>) -> Sequence<T>
where
    T: Ord + Send + 'static,
{
    sort_by(sequence, T::cmp)
}

/// Sorts the elements by the key returned by `selector`.
pub fn sort_by_key<T, K, F>(sequence: Sequence<T>, mut selector: F) -> Sequence<T>
where
    T: Send + 'static,
    K: Ord,
    F: FnMut(&T) -> K + Send + 'static,
{
    sort_by(sequence, move |left, right| selector(left).cmp(&selector(right)))
}
