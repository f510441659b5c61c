//! Arena-specific error types.

use thiserror::Error;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The bump cursor would run past the end of the arena.
    #[error(
        "frame arena capacity exceeded: requested {requested} words, \
         {available} of {capacity} available"
    )]
    CapacityExceeded {
        /// Number of words requested.
        requested: usize,
        /// Words left before the request.
        available: usize,
        /// Total capacity in words.
        capacity: usize,
    },
    /// A [`SliceHandle`](crate::SliceHandle) from a generation that has
    /// been reset.
    #[error("stale handle: generation {handle_generation}, current {current}")]
    StaleHandle {
        /// The generation encoded in the handle.
        handle_generation: u32,
        /// The arena's current generation.
        current: u32,
    },
    /// `reset` was called while leases from this generation are alive.
    #[error("cannot reset frame arena: {count} leases outstanding")]
    LeasesOutstanding {
        /// Number of live leases.
        count: usize,
    },
    /// The configuration was rejected.
    #[error("invalid arena config: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: &'static str,
    },
}
