//! Shared configuration types for lazyflow pipelines.

mod backoff;
mod base;
mod parallel;

pub use backoff::{BackoffConfig, BackoffStrategy};
pub use base::ValidationError;
pub use parallel::{BufferConfig, ParallelConfig};
