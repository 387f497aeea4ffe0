//! Push-to-pull adapter between a producer and a lazily consumed sequence.
//!
//! A [`FeedableSequence`] is a cloneable producer handle over a shared buffer. Producers
//! append items with [`FeedableSequence::feed`] and close the buffer with
//! [`FeedableSequence::end`] or [`FeedableSequence::throw`]. A single consumer obtained
//! through [`FeedableSequence::consume`] drains the buffer in FIFO order.
//!
//! The consumer never reads the shared buffer in place: whenever its local batch runs dry
//! it swaps the shared buffer for an empty one under the lock and yields from the batch it
//! took. A producer feeding concurrently always appends to the fresh buffer, so no item is
//! lost or yielded twice.
//!
//! Two signals let producers pace themselves:
//! - [`FeedableSequence::read`] resolves every time an item is handed to the consumer.
//! - [`FeedableSequence::empty`] resolves every time the last pending item is handed out.
//!
//! Both follow "resolve and reset" semantics: a waiter is woken by the next occurrence
//! after the returned future was created.

use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use futures::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SeqError, SeqResult};
use crate::sequence::Sequence;

/// Entry stored in the feed buffer.
enum FeedEntry<T> {
    Item(T),
    Error(SeqError),
}

/// State guarded by the feed lock.
struct FeedState<T> {
    buffer: VecDeque<FeedEntry<T>>,
    closed: bool,
    consumer_attached: bool,
    consumer_waker: Option<Waker>,
}

/// State shared between the producer handles and the consumer.
struct Shared<T> {
    state: Mutex<FeedState<T>>,
    /// Items fed but not yet handed to the consumer.
    pending: AtomicUsize,
    abandoned: AtomicBool,
    read: Notify,
    empty: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, FeedState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer handle of a push-fed sequence.
///
/// Cloning the handle yields another producer for the same buffer.
pub struct FeedableSequence<T> {
    shared: Arc<Shared<T>>,
}

impl<T> FeedableSequence<T>
where
    T: Send + 'static,
{
    /// Creates a new, open and empty feed.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(FeedState {
                    buffer: VecDeque::new(),
                    closed: false,
                    consumer_attached: false,
                    consumer_waker: None,
                }),
                pending: AtomicUsize::new(0),
                abandoned: AtomicBool::new(false),
                read: Notify::new(),
                empty: Notify::new(),
            }),
        }
    }

    /// Appends an item to the feed.
    ///
    /// Fails with [`ErrorKind::FeedClosed`] once [`FeedableSequence::end`] or
    /// [`FeedableSequence::throw`] has been called.
    pub fn feed(&self, item: T) -> SeqResult<()> {
        let waker = {
            let mut state = self.shared.lock();
            if state.closed {
                bail!(ErrorKind::FeedClosed, "Cannot feed a closed sequence");
            }

            state.buffer.push_back(FeedEntry::Item(item));
            self.shared.pending.fetch_add(1, Ordering::AcqRel);
            state.consumer_waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }

        Ok(())
    }

    /// Closes the feed. Items already buffered are still delivered.
    ///
    /// Calling this on a closed feed has no effect.
    pub fn end(&self) {
        let waker = {
            let mut state = self.shared.lock();
            state.closed = true;
            state.consumer_waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Appends a terminal error and closes the feed.
    ///
    /// The consumer observes `error` after every item fed before it.
    pub fn throw(&self, error: SeqError) -> SeqResult<()> {
        let waker = {
            let mut state = self.shared.lock();
            if state.closed {
                bail!(ErrorKind::FeedClosed, "Cannot throw into a closed sequence");
            }

            state.buffer.push_back(FeedEntry::Error(error));
            state.closed = true;
            state.consumer_waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }

        Ok(())
    }

    /// Returns `true` once the feed no longer accepts items.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Returns the number of fed items that have not yet been handed to the consumer.
    pub fn buffer_size(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Returns `true` once the consumer has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.shared.abandoned.load(Ordering::Acquire)
    }

    /// Returns a future resolving the next time an item is handed to the consumer.
    ///
    /// Also resolves if the consumer is dropped.
    pub fn read(&self) -> Notified<'_> {
        self.shared.read.notified()
    }

    /// Returns a future resolving the next time the feed drains to zero pending items.
    ///
    /// Also resolves if the consumer is dropped.
    pub fn empty(&self) -> Notified<'_> {
        self.shared.empty.notified()
    }

    /// Attaches the single consumer of this feed.
    ///
    /// Fails with [`ErrorKind::ConsumerAlreadyAttached`] if a consumer was attached before.
    pub fn consume(&self) -> SeqResult<Sequence<T>> {
        {
            let mut state = self.shared.lock();
            if state.consumer_attached {
                bail!(
                    ErrorKind::ConsumerAlreadyAttached,
                    "Feed already has a consumer"
                );
            }
            state.consumer_attached = true;
        }

        Ok(Sequence::from_try_stream(FeedConsumer {
            shared: Arc::clone(&self.shared),
            drained: VecDeque::new(),
            finished: false,
        }))
    }
}

impl<T> Clone for FeedableSequence<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for FeedableSequence<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FeedableSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedableSequence")
            .field("closed", &self.shared.lock().closed)
            .field("pending", &self.shared.pending.load(Ordering::Acquire))
            .field("abandoned", &self.shared.abandoned.load(Ordering::Acquire))
            .finish()
    }
}

/// Consumer side of a [`FeedableSequence`].
struct FeedConsumer<T> {
    shared: Arc<Shared<T>>,
    /// Batch swapped out of the shared buffer, yielded front to back.
    drained: VecDeque<FeedEntry<T>>,
    finished: bool,
}

// No field is ever pinned.
impl<T> Unpin for FeedConsumer<T> {}

impl<T> Stream for FeedConsumer<T> {
    type Item = SeqResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            if let Some(entry) = this.drained.pop_front() {
                return match entry {
                    FeedEntry::Item(item) => {
                        let remaining = this.shared.pending.fetch_sub(1, Ordering::AcqRel) - 1;
                        this.shared.read.notify_waiters();
                        if remaining == 0 {
                            this.shared.empty.notify_waiters();
                        }

                        Poll::Ready(Some(Ok(item)))
                    }
                    FeedEntry::Error(error) => {
                        this.finished = true;
                        this.drained.clear();

                        Poll::Ready(Some(Err(error)))
                    }
                };
            }

            let mut state = this.shared.lock();
            if !state.buffer.is_empty() {
                this.drained = std::mem::take(&mut state.buffer);
                continue;
            }

            if state.closed {
                this.finished = true;
                return Poll::Ready(None);
            }

            state.consumer_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
    }
}

impl<T> Drop for FeedConsumer<T> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("feed consumer dropped before the feed was drained");
        }

        self.shared.abandoned.store(true, Ordering::Release);
        self.shared.read.notify_waiters();
        self.shared.empty.notify_waiters();
    }
}
