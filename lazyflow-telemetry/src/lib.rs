//! Telemetry setup shared by lazyflow binaries and tests.

pub mod tracing;
