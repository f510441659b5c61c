//! Core types and traits for the Flux collision solver.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: group identity,
//! the broad-phase [`DistanceIndex`] key, comparator-driven search
//! helpers, collision tunables, and the [`Constraint`] variants applied
//! alongside collision resolution.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod constraint;
pub mod distance;
pub mod error;
pub mod id;
pub mod search;
pub mod tunables;

pub use constraint::{Constraint, ConstraintKind, Plane, SatisfyFn};
pub use distance::DistanceIndex;
pub use error::{ConstraintError, TunablesError};
pub use glam::Vec3;
pub use id::{FrameId, GroupId};
pub use tunables::{CollisionParams, CollisionTunables};
