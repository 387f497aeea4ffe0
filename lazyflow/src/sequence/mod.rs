//! Dual-mode lazy sequences.
//!
//! A [`Sequence`] wraps either a synchronous iterator or an asynchronous stream of
//! [`SeqResult`] elements. The mode is fixed when the sequence is constructed and every
//! combinator in [`crate::combinators`] branches on it, so a chain of synchronous steps
//! over a synchronous source never introduces a suspension point.
//!
//! Sequences end at their first error: once an `Err` element has been yielded the
//! sequence reports exhaustion on every later pull.

use core::pin::Pin;
use core::task::{Context, Poll, ready};
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use pin_project_lite::pin_project;
use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, SeqResult};

/// Boxed synchronous cursor backing a [`Sequence::Sync`].
pub type SyncSource<T> = Box<dyn Iterator<Item = SeqResult<T>> + Send>;

/// Boxed asynchronous cursor backing a [`Sequence::Async`].
pub type AsyncSource<T> = BoxStream<'static, SeqResult<T>>;

/// Execution mode of a [`Sequence`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Elements are produced immediately on every pull.
    Sync,
    /// Elements may only be available after a suspension.
    Async,
}

/// A lazily evaluated sequence that is either synchronous or asynchronous.
pub enum Sequence<T> {
    /// Pull-based sequence produced without suspension.
    Sync(SyncSource<T>),
    /// Pull-based sequence produced through suspension points.
    Async(AsyncSource<T>),
}

impl<T> Sequence<T> {
    /// Returns the execution mode this sequence was constructed with.
    pub fn mode(&self) -> Mode {
        match self {
            Sequence::Sync(_) => Mode::Sync,
            Sequence::Async(_) => Mode::Async,
        }
    }
}

impl<T> Sequence<T>
where
    T: Send + 'static,
{
    /// Creates a synchronous sequence over an infallible collection or iterator.
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Sequence::Sync(Box::new(items.into_iter().map(Ok)))
    }

    /// Creates a synchronous sequence over a fallible iterator.
    pub fn from_results<I>(items: I) -> Self
    where
        I: IntoIterator<Item = SeqResult<T>>,
        I::IntoIter: Send + 'static,
    {
        Sequence::sync(items.into_iter())
    }

    /// Creates an asynchronous sequence over an infallible stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Sequence::Async(stream.map(Ok).boxed())
    }

    /// Creates an asynchronous sequence over a fallible stream.
    pub fn from_try_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = SeqResult<T>> + Send + 'static,
    {
        Sequence::stream(stream)
    }

    /// Creates an empty synchronous sequence.
    pub fn empty() -> Self {
        Sequence::Sync(Box::new(std::iter::empty()))
    }

    /// Wraps a fallible iterator so that it ends after its first error.
    pub(crate) fn sync<I>(iter: I) -> Self
    where
        I: Iterator<Item = SeqResult<T>> + Send + 'static,
    {
        Sequence::Sync(Box::new(StopOnError::new(iter)))
    }

    /// Wraps a fallible stream so that it ends after its first error.
    pub(crate) fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = SeqResult<T>> + Send + 'static,
    {
        Sequence::Async(StopOnError::new(stream).boxed())
    }

    /// Pulls the next element.
    ///
    /// Returns `None` once the sequence is exhausted. For synchronous sequences the
    /// returned future is always immediately ready.
    pub async fn next(&mut self) -> Option<SeqResult<T>> {
        match self {
            Sequence::Sync(iter) => iter.next(),
            Sequence::Async(stream) => stream.next().await,
        }
    }

    /// Converts this sequence into an asynchronous stream, adapting synchronous sources.
    pub fn into_stream(self) -> AsyncSource<T> {
        match self {
            Sequence::Sync(iter) => stream::iter(iter).boxed(),
            Sequence::Async(stream) => stream,
        }
    }

    /// Converts this sequence into an asynchronous sequence.
    pub fn into_async(self) -> Self {
        Sequence::Async(self.into_stream())
    }

    /// Returns the synchronous cursor of this sequence.
    ///
    /// Fails with [`ErrorKind::InvalidArgument`] for asynchronous sequences; use
    /// [`Sequence::to_sync`] to materialize those first.
    pub fn try_into_iter(self) -> SeqResult<SyncSource<T>> {
        match self {
            Sequence::Sync(iter) => Ok(iter),
            Sequence::Async(_) => bail!(
                ErrorKind::InvalidArgument,
                "Sequence is not synchronous",
                "materialize the sequence with `to_sync` before iterating it synchronously"
            ),
        }
    }

    /// Converts this sequence into a synchronous one.
    ///
    /// Synchronous sequences are returned untouched. Asynchronous sequences are drained
    /// into memory, failing with the first error encountered.
    pub async fn to_sync(self) -> SeqResult<Sequence<T>> {
        match self {
            Sequence::Sync(_) => Ok(self),
            Sequence::Async(_) => crate::combinators::materialize(self).await,
        }
    }
}

impl Sequence<i64> {
    /// Creates a synchronous sequence over `from_inclusive..=to_inclusive`.
    pub fn range(from_inclusive: i64, to_inclusive: i64) -> Self {
        Sequence::from_iter(from_inclusive..=to_inclusive)
    }
}

impl<T> From<Vec<T>> for Sequence<T>
where
    T: Send + 'static,
{
    fn from(items: Vec<T>) -> Self {
        Sequence::from_iter(items)
    }
}

impl<T> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sequence").field(&self.mode()).finish()
    }
}

/// Runs `start` on the first poll of the returned stream, then forwards `stream`.
///
/// Used by operators that spawn background pumps so that nothing runs until the
/// consumer actually asks for an element.
pub(crate) fn start_on_first_poll<S, F>(start: F, stream: S) -> impl Stream<Item = S::Item> + Send
where
    S: Stream + Send + 'static,
    S::Item: Send,
    F: FnOnce() + Send + 'static,
{
    stream::once(async move { start() })
        .filter_map(|()| future::ready(None::<S::Item>))
        .chain(stream)
}

pin_project! {
    /// Adapter that ends a fallible iterator or stream right after its first error.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub(crate) struct StopOnError<S> {
        #[pin]
        inner: S,
        failed: bool,
    }
}

impl<S> StopOnError<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            failed: false,
        }
    }
}

impl<I, T> Iterator for StopOnError<I>
where
    I: Iterator<Item = SeqResult<T>>,
{
    type Item = SeqResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let item = self.inner.next()?;
        self.failed = item.is_err();

        Some(item)
    }
}

impl<S, T> Stream for StopOnError<S>
where
    S: Stream<Item = SeqResult<T>>,
{
    type Item = SeqResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.failed {
            return Poll::Ready(None);
        }

        let item = ready!(this.inner.poll_next(cx));
        *this.failed = matches!(item, Some(Err(_)));

        Poll::Ready(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq_error;

    #[tokio::test]
    async fn mode_is_resolved_at_construction() {
        assert_eq!(Sequence::from_iter(vec![1, 2]).mode(), Mode::Sync);
        assert_eq!(
            Sequence::from_stream(stream::iter(vec![1, 2])).mode(),
            Mode::Async
        );
        assert_eq!(Sequence::<u8>::empty().mode(), Mode::Sync);
        assert_eq!(Sequence::range(1, 3).into_async().mode(), Mode::Async);
    }

    #[tokio::test]
    async fn next_pulls_elements_in_order() {
        let mut sequence = Sequence::range(1, 3);

        assert_eq!(sequence.next().await, Some(Ok(1)));
        assert_eq!(sequence.next().await, Some(Ok(2)));
        assert_eq!(sequence.next().await, Some(Ok(3)));
        assert_eq!(sequence.next().await, None);
    }

    #[tokio::test]
    async fn sequences_end_after_first_error() {
        let mut sequence = Sequence::from_results(vec![
            Ok(1),
            Err(seq_error!(ErrorKind::SourceFailed, "cursor failed")),
            Ok(3),
        ]);

        assert_eq!(sequence.next().await, Some(Ok(1)));
        assert!(matches!(sequence.next().await, Some(Err(_))));
        assert_eq!(sequence.next().await, None);

        let mut sequence = Sequence::from_try_stream(stream::iter(vec![
            Err(seq_error!(ErrorKind::SourceFailed, "cursor failed")),
            Ok(2),
        ]));

        assert!(matches!(sequence.next().await, Some(Err(_))));
        assert_eq!(sequence.next().await, None);
    }

    #[tokio::test]
    async fn try_into_iter_rejects_async_sequences() {
        let iter = Sequence::from_iter(vec![1, 2]).try_into_iter().unwrap();
        assert_eq!(iter.collect::<SeqResult<Vec<_>>>().unwrap(), vec![1, 2]);

        let Err(err) = Sequence::from_stream(stream::iter(vec![1])).try_into_iter() else {
            panic!("async sequences cannot be iterated synchronously");
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn to_sync_materializes_async_sequences() {
        let sequence = Sequence::from_stream(stream::iter(vec![4, 5, 6]));
        let sync = sequence.to_sync().await.unwrap();

        assert_eq!(sync.mode(), Mode::Sync);
        let items = sync.try_into_iter().unwrap().collect::<SeqResult<Vec<_>>>();
        assert_eq!(items.unwrap(), vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn start_on_first_poll_defers_start() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let mut stream = Box::pin(start_on_first_poll(
            move || flag.store(true, Ordering::SeqCst),
            stream::iter(vec![1]),
        ));

        assert!(!started.load(Ordering::SeqCst));
        assert_eq!(stream.next().await, Some(1));
        assert!(started.load(Ordering::SeqCst));
        assert_eq!(stream.next().await, None);
    }
}
