//! Engine Configuration
//!
//! Construction-time knobs for the data grid. Everything here is fixed once
//! the grid is built: the shard count cannot be resized (it would rehash the
//! whole keyspace) and the admission policy is not a per-call choice (caller
//! code stays simple and predictable).

use crate::pipeline::AdmissionPolicy;
use crate::store::{ReaperConfig, DEFAULT_SHARD_COUNT};
use thiserror::Error;

/// Errors produced by configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The worker pool must have at least one worker.
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    /// The store must have at least one shard.
    #[error("shard count must be at least 1")]
    ZeroShards,
}

/// Configuration for a [`DataGrid`](crate::grid::DataGrid).
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Number of store shards; rounded up to a power of two (default: 64).
    pub shard_count: usize,

    /// Fixed number of ingest worker tasks (default: 4).
    pub workers: usize,

    /// Admitted jobs that may wait beyond the in-flight ones (default: 1024).
    pub queue_capacity: usize,

    /// What `submit` does when the pipeline is saturated (default: Reject).
    pub policy: AdmissionPolicy,

    /// Background sweep configuration.
    pub reaper: ReaperConfig,

    /// Idle scratch buffers retained by the payload codec (default: 64).
    pub codec_pool_capacity: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            workers: 4,
            queue_capacity: 1024,
            policy: AdmissionPolicy::Reject,
            reaper: ReaperConfig::default(),
            codec_pool_capacity: 64,
        }
    }
}

impl GridConfig {
    /// Checks the configuration for values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.shard_count == 0 {
            return Err(ConfigError::ZeroShards);
        }
        Ok(())
    }
}
