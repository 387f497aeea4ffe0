//! Size-based batching and read-ahead buffering.

use core::pin::Pin;
use core::task::{Context, Poll};
use futures::{Stream, ready};
use pin_project_lite::pin_project;
use tracing::debug;

use crate::bail;
use crate::concurrency::feed::FeedableSequence;
use crate::error::{ErrorKind, SeqResult};
use crate::sequence::{Sequence, start_on_first_poll};

/// Groups consecutive elements into vectors of `size` elements.
///
/// The last batch holds the remaining elements and may be shorter. A source error is
/// yielded as soon as it is pulled; the partial batch collected before it is dropped.
/// Fails with [`ErrorKind::InvalidArgument`] if `size` is zero.
pub fn batch<T>(sequence: Sequence<T>, size: usize) -> SeqResult<Sequence<Vec<T>>>
where
    T: Send + 'static,
{
    if size == 0 {
        bail!(
            ErrorKind::InvalidArgument,
            "Batch size must be greater than 0"
        );
    }

    let batched = match sequence {
        Sequence::Sync(mut iter) => {
            let mut ended = false;

            Sequence::sync(std::iter::from_fn(move || {
                if ended {
                    return None;
                }

                let mut items = Vec::with_capacity(size);
                for item in iter.by_ref() {
                    match item {
                        Ok(item) => {
                            items.push(item);
                            if items.len() == size {
                                return Some(Ok(items));
                            }
                        }
                        Err(err) => {
                            ended = true;
                            return Some(Err(err));
                        }
                    }
                }

                ended = true;
                (!items.is_empty()).then_some(Ok(items))
            }))
        }
        Sequence::Async(stream) => Sequence::stream(Batch::new(stream, size)),
    };

    Ok(batched)
}

pin_project! {
    /// A stream adapter collecting items into batches of a fixed size.
    #[must_use = "streams do nothing unless polled"]
    pub struct Batch<S, T> {
        #[pin]
        stream: S,
        items: Vec<T>,
        size: usize,
        ended: bool,
    }
}

impl<S, T> Batch<S, T> {
    /// Creates a new [`Batch`] emitting vectors of `size` items.
    pub fn new(stream: S, size: usize) -> Self {
        Self {
            stream,
            items: Vec::with_capacity(size),
            size,
            ended: false,
        }
    }
}

impl<S, T> Stream for Batch<S, T>
where
    S: Stream<Item = SeqResult<T>>,
{
    type Item = SeqResult<Vec<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.ended {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(item)) => {
                    this.items.push(item);
                    if this.items.len() >= *this.size {
                        let full = std::mem::replace(this.items, Vec::with_capacity(*this.size));
                        return Poll::Ready(Some(Ok(full)));
                    }
                }
                Some(Err(err)) => {
                    *this.ended = true;
                    this.items.clear();

                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    *this.ended = true;
                    if this.items.is_empty() {
                        return Poll::Ready(None);
                    }

                    return Poll::Ready(Some(Ok(std::mem::take(this.items))));
                }
            }
        }
    }
}

/// Reads up to `size` elements ahead of the consumer.
///
/// For asynchronous sequences a background task pulls the source into a
/// [`FeedableSequence`] while the consumer processes earlier elements, and waits on the
/// feed's `read` signal whenever `size` elements are pending. The task starts on the first
/// pull and stops when the consumer is dropped. Synchronous sequences are returned
/// unchanged since there is no latency to overlap.
///
/// Fails with [`ErrorKind::InvalidArgument`] if `size` is zero.
pub fn buffer<T>(sequence: Sequence<T>, size: usize) -> SeqResult<Sequence<T>>
where
    T: Send + 'static,
{
    if size == 0 {
        bail!(
            ErrorKind::InvalidArgument,
            "Buffer size must be greater than 0"
        );
    }

    if let Sequence::Sync(_) = sequence {
        return Ok(sequence);
    }

    let feed = FeedableSequence::new();
    let output = feed.consume()?;

    let buffered = start_on_first_poll(
        move || {
            tokio::spawn(read_ahead(sequence, feed, size));
        },
        output.into_stream(),
    );

    Ok(Sequence::stream(buffered))
}

async fn read_ahead<T>(mut source: Sequence<T>, feed: FeedableSequence<T>, size: usize)
where
    T: Send + 'static,
{
    loop {
        let read = feed.read();
        if feed.is_abandoned() {
            debug!("buffer consumer dropped, stopping read-ahead");
            return;
        }

        if feed.buffer_size() >= size {
            read.await;
            continue;
        }
        drop(read);

        match source.next().await {
            Some(Ok(item)) => {
                if feed.feed(item).is_err() {
                    return;
                }
            }
            Some(Err(err)) => {
                let _ = feed.throw(err);
                return;
            }
            None => {
                feed.end();
                return;
            }
        }
    }
}
