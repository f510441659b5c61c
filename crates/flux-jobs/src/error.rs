//! Scheduler error types.

use thiserror::Error;

/// Errors from constructing or using a [`JobScheduler`](crate::JobScheduler).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The configuration was rejected.
    #[error("invalid scheduler config: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: &'static str,
    },
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread {index}: {source}")]
    ThreadSpawnFailed {
        /// Index of the worker that failed.
        index: usize,
        /// The OS error.
        #[source]
        source: std::io::Error,
    },
}
