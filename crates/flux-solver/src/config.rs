//! Solver configuration.

use flux_arena::ArenaConfig;
use flux_core::CollisionTunables;

use crate::error::ConfigError;

/// How a [`LocalSolver`](crate::LocalSolver) orders its streamed entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortStrategy {
    /// Append entries as they arrive and sort once streaming completes.
    #[default]
    Bulk,
    /// Binary-insert each entry as it arrives, keeping the index sorted
    /// throughout streaming.
    Incremental,
}

/// Configuration for a [`CollisionSolver`](crate::CollisionSolver).
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Initial collision constants. May be replaced between frames by a
    /// [`TunablesSource`](crate::TunablesSource).
    pub tunables: CollisionTunables,
    /// Frame arena sizing.
    pub arena: ArenaConfig,
    /// Broad-phase sort strategy.
    pub sort: SortStrategy,
    /// Expected number of groups per frame. Pre-sizes the query table.
    /// Default: 64.
    pub query_capacity: usize,
    /// Tail margin for cross-group jobs when dispatching onto a
    /// [`JobGroup`](flux_jobs::JobGroup): they are held back until at
    /// most this many bulk jobs remain. Default: 3.
    pub global_job_margin: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tunables: CollisionTunables::default(),
            arena: ArenaConfig::default(),
            sort: SortStrategy::default(),
            query_capacity: 64,
            global_job_margin: 3,
        }
    }
}

impl SolverConfig {
    /// Check every nested configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tunables.validate()?;
        self.arena.validate()?;
        Ok(())
    }
}
