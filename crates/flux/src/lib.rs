//! Flux: streaming particle collision resolution on a shared job scheduler.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Flux sub-crates. For most users, adding `flux` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use flux::prelude::*;
//!
//! let config = SolverConfig {
//!     tunables: CollisionTunables::uniform(CollisionParams::new(1.2, 2)),
//!     ..SolverConfig::default()
//! };
//! let solver =
//!     CollisionSolver::with_scheduler_config(config, SchedulerConfig::with_workers(2)).unwrap();
//!
//! let a = ParticleBuffer::from_particles(
//!     &[Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)],
//!     &[Vec3::X, Vec3::ZERO, Vec3::ZERO],
//! );
//! let b = ParticleBuffer::from_particles(&[Vec3::new(0.05, 0.0, 0.0)], &[-Vec3::X]);
//!
//! solver.begin_batch(None);
//! for buffer in [&a, &b] {
//!     let mut ctx = solver.begin_async(buffer, 1.0 / 60.0, None);
//!     let state = buffer.lock();
//!     for i in 0..buffer.live_count() {
//!         ctx.submit_query(i, state.positions[i], state.velocities[i]);
//!     }
//! }
//! solver.end_batch();
//!
//! let report = solver.await_completion();
//! assert_eq!(report.local_collisions, 1);
//! assert_eq!(report.global_collisions, 2);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `flux-core` | IDs, tunables, broad-phase keys, constraints |
//! | [`arena`] | `flux-arena` | Per-frame bump arena and slice leases |
//! | [`jobs`] | `flux-jobs` | Worker pool, job groups, sync primitives |
//! | [`solver`] | `flux-solver` | Local and global solvers, the frame facade |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`flux-core`).
///
/// Tunables, the broad-phase [`types::DistanceIndex`] and the
/// [`types::Constraint`] responses.
pub use flux_core as types;

/// Frame-scoped storage (`flux-arena`).
pub use flux_arena as arena;

/// Job scheduling (`flux-jobs`).
///
/// [`jobs::JobScheduler`] is the shared pool; [`jobs::JobGroup`] tracks a
/// batch of jobs and can hold some back until the rest drain.
pub use flux_jobs as jobs;

/// Collision resolution (`flux-solver`).
///
/// [`solver::CollisionSolver`] drives frames. [`solver::resolve_local`]
/// and [`solver::resolve_pair`] are the two resolution passes, usable on
/// their own.
pub use flux_solver as solver;

/// Common imports for typical Flux usage.
///
/// ```rust
/// use flux::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use flux_core::{
        CollisionParams, CollisionTunables, Constraint, FrameId, GroupId, Plane, Vec3,
    };

    // Errors
    pub use flux_core::{ConstraintError, TunablesError};
    pub use flux_solver::{ConfigError, ReloadError, SolverError};

    // Scheduling
    pub use flux_jobs::{JobGroup, JobScheduler, SchedulerConfig};

    // Solver
    pub use flux_solver::{
        AsyncContext, CollisionSolver, FrameReport, JsonTunablesFile, ParticleBuffer,
        SolverConfig, SortStrategy,
    };
}
