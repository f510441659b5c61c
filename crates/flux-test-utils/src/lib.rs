//! Test fixtures for Flux development.
//!
//! - [`cloud`]: a deterministic particle group from a seeded ChaCha8 RNG.
//! - [`stream_all`]: drive an [`AsyncContext`] from a buffer's own state.
//! - [`CountingConstraint`]: a custom constraint that records what it saw.
//! - [`test_solver`]: a small solver with uniform tunables.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flux_core::{CollisionParams, CollisionTunables, Constraint, Vec3};
use flux_jobs::SchedulerConfig;
use flux_solver::{AsyncContext, CollisionSolver, ParticleBuffer, SolverConfig};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// `n` particles scattered uniformly in a cube of half-width `spread`
/// around `center`, with velocities in `[-1, 1)` per axis.
pub fn cloud(seed: u64, n: usize, center: Vec3, spread: f32) -> ParticleBuffer {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut unit = || Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    );
    let mut positions = Vec::with_capacity(n);
    let mut velocities = Vec::with_capacity(n);
    for _ in 0..n {
        positions.push(center + unit() * spread);
        velocities.push(unit());
    }
    ParticleBuffer::from_particles(&positions, &velocities)
}

/// Submit every live entity of `buffer` as-is, from a copy of its state
/// so that a constraint job can write back while streaming runs.
pub fn stream_all(ctx: &mut AsyncContext, buffer: &ParticleBuffer) {
    let state = buffer.lock().clone();
    for i in 0..buffer.live_count() {
        ctx.submit_query(i, state.positions[i], state.velocities[i]);
    }
}

/// Solver on `workers` threads using `params` for both tiers.
pub fn test_solver(workers: usize, params: CollisionParams) -> CollisionSolver {
    let config = SolverConfig {
        tunables: CollisionTunables::uniform(params),
        ..SolverConfig::default()
    };
    CollisionSolver::with_scheduler_config(config, SchedulerConfig::with_workers(workers))
        .expect("test solver config is valid")
}

/// Custom constraint that counts calls and entities and leaves the data
/// untouched.
#[derive(Clone, Debug, Default)]
pub struct CountingConstraint {
    pub calls: Arc<AtomicUsize>,
    pub entities: Arc<AtomicUsize>,
}

impl CountingConstraint {
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`Constraint`] reporting into this counter. Reports every
    /// entity it sees as corrected.
    pub fn constraint(&self) -> Constraint {
        let calls = Arc::clone(&self.calls);
        let entities = Arc::clone(&self.entities);
        Constraint::custom(move |positions: &mut [Vec3], _velocities: &mut [Vec3]| {
            calls.fetch_add(1, Ordering::SeqCst);
            entities.fetch_add(positions.len(), Ordering::SeqCst);
            positions.len() as u32
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn entities(&self) -> usize {
        self.entities.load(Ordering::SeqCst)
    }
}
