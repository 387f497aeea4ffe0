//! Pacing operators: throttling and cooperative yielding.
//!
//! These operators always produce asynchronous sequences since they introduce suspension
//! points between elements.

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::bail;
use crate::error::{ErrorKind, SeqResult};
use crate::sequence::Sequence;

/// How long [`throttle`] waits between two elements.
pub enum Throttle {
    /// A fixed delay.
    Delay(Duration),
    /// A caller-provided wait, awaited once per gap.
    Function(Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>),
}

impl Throttle {
    /// Creates a throttle awaiting the future returned by `wait` between elements.
    pub fn function<F, Fut>(mut wait: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Throttle::Function(Box::new(move || wait().boxed()))
    }

    async fn wait(&mut self) {
        match self {
            Throttle::Delay(delay) => tokio::time::sleep(*delay).await,
            Throttle::Function(wait) => wait().await,
        }
    }
}

impl From<Duration> for Throttle {
    fn from(delay: Duration) -> Self {
        Throttle::Delay(delay)
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Throttle::Delay(delay) => f.debug_tuple("Delay").field(delay).finish(),
            Throttle::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Waits according to `throttle` before pulling every element but the first.
pub fn throttle<T>(sequence: Sequence<T>, throttle: impl Into<Throttle>) -> Sequence<T>
where
    T: Send + 'static,
{
    let state = (sequence.into_stream(), throttle.into(), true);

    let throttled = stream::unfold(state, |(mut source, mut throttle, first)| async move {
        if !first {
            throttle.wait().await;
        }

        let item = source.next().await?;
        Some((item, (source, throttle, false)))
    });

    Sequence::stream(throttled)
}

/// Yields to the runtime after every `count` elements.
///
/// Lets long synchronous-looking pipelines share the executor with other tasks. Fails
/// with [`ErrorKind::InvalidArgument`] if `count` is zero.
pub fn interrupt_every<T>(sequence: Sequence<T>, count: usize) -> SeqResult<Sequence<T>>
where
    T: Send + 'static,
{
    if count == 0 {
        bail!(
            ErrorKind::InvalidArgument,
            "Interrupt interval must be greater than 0"
        );
    }

    let state = (sequence.into_stream(), 0usize);
    let interrupted = stream::unfold(state, move |(mut source, mut yielded)| async move {
        if yielded > 0 && yielded % count == 0 {
            tokio::task::yield_now().await;
        }

        let item = source.next().await?;
        yielded += 1;

        Some((item, (source, yielded)))
    });

    Ok(Sequence::stream(interrupted))
}

/// Yields to the runtime roughly `times` times per second.
///
/// Fails with [`ErrorKind::InvalidArgument`] if `times` is zero.
pub fn interrupt_per_second<T>(sequence: Sequence<T>, times: u32) -> SeqResult<Sequence<T>>
where
    T: Send + 'static,
{
    if times == 0 {
        bail!(
            ErrorKind::InvalidArgument,
            "Interrupts per second must be greater than 0"
        );
    }

    let interval = Duration::from_secs(1) / times;
    let state = (sequence.into_stream(), Instant::now());

    let interrupted = stream::unfold(state, move |(mut source, mut last)| async move {
        if last.elapsed() >= interval {
            tokio::task::yield_now().await;
            last = Instant::now();
        }

        let item = source.next().await?;
        Some((item, (source, last)))
    });

    Ok(Sequence::stream(interrupted))
}
