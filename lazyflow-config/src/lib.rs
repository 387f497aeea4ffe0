//! Configuration for lazyflow pipelines.
//!
//! Provides the serde configuration types shared by the engine and its binaries, their
//! validation rules, and a hierarchical loader reading files and `APP_` environment variables.

pub mod environment;
pub mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
