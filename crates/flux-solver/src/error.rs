//! Solver error types.
//!
//! Only construction, configuration and tunables reloads return errors.
//! Broken invariants on the per-frame path are fatal.

use std::path::PathBuf;

use flux_arena::ArenaError;
use flux_core::TunablesError;
use flux_jobs::SchedulerError;
use thiserror::Error;

/// A [`SolverConfig`](crate::SolverConfig) failed validation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Collision tunables are out of range.
    #[error(transparent)]
    Tunables(#[from] TunablesError),
    /// Arena configuration is invalid.
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Errors constructing a [`CollisionSolver`](crate::CollisionSolver).
#[derive(Debug, Error)]
pub enum SolverError {
    /// The configuration was rejected.
    #[error("invalid solver config: {0}")]
    Config(#[from] ConfigError),
    /// The worker pool could not be started.
    #[error("job scheduler unavailable: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// A tunables reload failed; the previous tunables stay in effect.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The tunables file could not be read.
    #[error("cannot read tunables file {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The tunables file is not valid JSON for [`CollisionTunables`](flux_core::CollisionTunables).
    #[error("cannot parse tunables file {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The new tunables failed validation.
    #[error(transparent)]
    Invalid(#[from] TunablesError),
}
