use futures::stream::{self, StreamExt};
use std::time::Duration;

use crate::sequence::Sequence;

/// Returns a per-index delay in `0..5ms` that scrambles worker completion order.
///
/// The pattern is deterministic so failures reproduce, yet neighbouring indices never
/// finish in dispatch order.
pub fn jittered_delay(index: usize) -> Duration {
    Duration::from_millis(((index * 7) % 5) as u64)
}

/// Creates an asynchronous sequence that sleeps `delay` before producing each item.
pub fn delayed_stream<T>(items: Vec<T>, delay: Duration) -> Sequence<T>
where
    T: Send + 'static,
{
    let delayed = stream::iter(items).then(move |item| async move {
        tokio::time::sleep(delay).await;
        item
    });

    Sequence::from_stream(delayed)
}
