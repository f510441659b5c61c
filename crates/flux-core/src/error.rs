//! Error types for tunables validation and constraint application.

use thiserror::Error;

use crate::constraint::ConstraintKind;

/// A collision tunable failed validation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TunablesError {
    /// A float parameter is NaN, infinite, zero, or negative.
    #[error("{tier}.{name} must be finite and positive, got {value}")]
    NotPositive {
        /// Which parameter tier (`local` or `global`).
        tier: &'static str,
        /// The parameter name.
        name: &'static str,
        /// The rejected value.
        value: f32,
    },
    /// A cap is zero, which would disable resolution entirely.
    #[error("{tier}.{name} must be at least 1")]
    ZeroCap {
        /// Which parameter tier (`local` or `global`).
        tier: &'static str,
        /// The parameter name.
        name: &'static str,
    },
}

/// Errors raised while satisfying a [`Constraint`](crate::Constraint).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConstraintError {
    /// The constraint kind has no solver.
    #[error("no solver for {kind:?} constraints")]
    Unsupported {
        /// The kind that could not be applied.
        kind: ConstraintKind,
    },
    /// Position and velocity slices differ in length.
    #[error("positions ({positions}) and velocities ({velocities}) differ in length")]
    LengthMismatch {
        /// Length of the position slice.
        positions: usize,
        /// Length of the velocity slice.
        velocities: usize,
    },
}
