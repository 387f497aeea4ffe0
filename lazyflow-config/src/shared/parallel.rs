use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Settings of the bounded-concurrency parallel operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParallelConfig {
    /// Maximum number of in-flight workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Whether results are released in source order rather than completion order.
    #[serde(default = "default_keep_order")]
    pub keep_order: bool,
}

impl ParallelConfig {
    /// Default number of in-flight workers.
    pub const DEFAULT_CONCURRENCY: usize = 8;

    /// Validates parallel settings.
    ///
    /// Ensures concurrency is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::invalid(
                "parallel.concurrency",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            keep_order: default_keep_order(),
        }
    }
}

fn default_concurrency() -> usize {
    ParallelConfig::DEFAULT_CONCURRENCY
}

fn default_keep_order() -> bool {
    true
}

/// Read-ahead settings for buffered sequences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BufferConfig {
    /// Number of elements pulled ahead of the consumer.
    #[serde(default = "default_buffer_size")]
    pub size: usize,
}

impl BufferConfig {
    /// Default read-ahead size.
    pub const DEFAULT_SIZE: usize = 10;

    /// Validates buffer settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.size == 0 {
            return Err(ValidationError::invalid(
                "buffer.size",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size: default_buffer_size(),
        }
    }
}

fn default_buffer_size() -> usize {
    BufferConfig::DEFAULT_SIZE
}
