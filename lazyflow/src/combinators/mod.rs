//! Sequence combinators.
//!
//! Free functions over [`crate::sequence::Sequence`], grouped by concern. Each combinator
//! branches on the mode of its input, so synchronous pipelines stay synchronous unless a
//! combinator needs suspension points ([`buffer`], [`throttle`], the `_async` variants).
//! The fluent API over these functions is [`crate::enumerable::Enumerable`].

mod aggregate;
mod batch;
mod multiplex;
mod retry;
mod timing;
mod transform;

pub use aggregate::{
    all, any, drain, first, first_or_default, for_each, for_each_async, group, group_single,
    last, last_or_default, materialize, reduce, single, single_or_default, sort, sort_by,
    sort_by_key, to_vec,
};
pub use batch::{Batch, batch, buffer};
pub use multiplex::multiplex;
pub use retry::{RetryDecision, retry, retry_async};
pub use timing::{Throttle, interrupt_every, interrupt_per_second, throttle};
pub use transform::{
    assert, concat, default_if_empty, distinct, filter, filter_async, intercept, intercept_async,
    map, map_async, map_many, map_many_async, pairwise, skip, take, take_while,
};
