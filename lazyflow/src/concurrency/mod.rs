//! Concurrency primitives shared by sequences, parallel operators and poll loops.
//!
//! - [`cancellation`] provides the cooperative [`cancellation::CancellationToken`] threaded
//!   through every long-running operation.
//! - [`timer`] races waits and futures against a token.
//! - [`backoff`] computes and waits out growing delays.
//! - [`poll`] builds reusable poll loops on top of [`backoff`].
//! - [`feed`] adapts push-style producers to a pull-based [`crate::sequence::Sequence`].
//!
//! Nothing in this module interrupts work forcibly. Cancellation is observed at the
//! suspension points of the code that holds the token.

pub mod backoff;
pub mod cancellation;
pub mod feed;
pub mod poll;
pub mod timer;
