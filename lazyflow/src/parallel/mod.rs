//! Bounded-concurrency operators.
//!
//! Every operator here is a thin adapter over [`parallel_feed`], which dispatches one
//! worker task per element and feeds the results into a
//! [`crate::concurrency::feed::FeedableSequence`]. Outputs are always asynchronous.

mod engine;
mod ops;
mod reorder;

pub use engine::parallel_feed;
pub use ops::{parallel_filter, parallel_for_each, parallel_group, parallel_intercept, parallel_map};
