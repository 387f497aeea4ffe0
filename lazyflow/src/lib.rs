//! Lazy dual-mode sequences and the concurrency primitives built around them.
//!
//! A [`Sequence`] is either synchronous or asynchronous and keeps that mode through every
//! combinator. [`Enumerable`] chains the sequential combinators of [`combinators`] and the
//! bounded-concurrency operators of [`parallel`]. The [`concurrency`] module provides the
//! building blocks those operators share: push-fed sequences, cancellation tokens, backoff
//! and poll loops.

pub mod combinators;
pub mod concurrency;
pub mod enumerable;
pub mod error;
mod macros;
pub mod parallel;
pub mod sequence;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use enumerable::Enumerable;
pub use error::{ErrorKind, SeqError, SeqResult};
pub use sequence::{Mode, Sequence};

pub use lazyflow_config::shared::{
    BackoffConfig, BackoffStrategy, BufferConfig, ParallelConfig,
};
