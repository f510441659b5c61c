//! Streaming collision resolution for the Flux particle pipeline.
//!
//! The caller integrates each particle group in its own loop and streams
//! every resolved `(position, velocity)` into an [`AsyncContext`]. Behind
//! it, worker jobs sort the group by a broad-phase distance key as the
//! data arrives, register the group as a query, resolve same-group
//! contacts, and resolve contacts against every group registered earlier
//! in the frame. Impulses accumulate into the group's [`ImpulseBuffer`],
//! which the caller reads back after the frame settles.
//!
//! # Frame lifecycle
//!
//! ```text
//! begin_batch ──► begin_async(A) ─► stream A ─┐
//!             └─► begin_async(B) ─► stream B ─┤   (worker jobs)
//!                                             ├─ sort ─► submit ─► local resolve
//!                                             └─ pair jobs (B × A)
//! end_batch
//! begin_batch ──► first begin_async settles the previous frame
//! ```
//!
//! Settlement waits for every job issued in the frame, returns each
//! [`LocalSolver`] to idle, clears the query table and resets the frame
//! arena. It is deferred out of `begin_batch` so the previous frame's
//! jobs overlap with the caller's work between frames. Waiting on a single
//! group with `await_query_completion` blocks on that group's own jobs
//! and leaves the frame open to later groups.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod constraint_runner;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod global;
pub mod local;
pub mod registry;
pub mod reload;
pub mod solver;
pub mod workspace;

pub use buffer::{ImpulseBuffer, ParticleBuffer, ParticleState};
pub use config::{SolverConfig, SortStrategy};
pub use constraint_runner::ConstraintRunner;
pub use context::AsyncContext;
pub use dispatch::Dispatch;
pub use error::{ConfigError, ReloadError, SolverError};
pub use frame::FrameReport;
pub use global::{resolve_pair, GlobalSolver};
pub use local::{resolve_local, LocalSolver, SolverPhase};
pub use registry::SolverRegistry;
pub use reload::{FixedTunables, JsonTunablesFile, ReloadHandle, TunablesSource};
pub use solver::CollisionSolver;
pub use workspace::Workspace;
