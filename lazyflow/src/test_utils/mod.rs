//! Helpers shared by the unit and integration tests of this crate.

pub mod source;
pub mod wait;

pub use source::{delayed_stream, jittered_delay};
pub use wait::{DEFAULT_WAIT_TIMEOUT, TimedWait};
