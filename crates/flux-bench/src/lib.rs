//! Benchmark profiles and the particle loop shared by the demo.
//!
//! - [`Emitter`]: spawns particles into a group at a steady rate
//! - [`step_group`]: half-step integration streamed into an [`AsyncContext`]
//! - [`pointfall_profile`]: two emitters firing across each other over a floor

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use flux_core::Vec3;
use flux_solver::{AsyncContext, ParticleBuffer};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Constant acceleration applied to every particle.
pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.8, 0.0);

/// Spawns particles at a fixed point with a jittered launch velocity.
#[derive(Debug)]
pub struct Emitter {
    /// Spawn point.
    pub position: Vec3,
    /// Base launch velocity.
    pub velocity: Vec3,
    /// Per-axis half-range of the launch jitter.
    pub velocity_spread: Vec3,
    /// Particles per second.
    pub rate: f32,
    pending: f32,
    rng: ChaCha8Rng,
}

impl Emitter {
    /// Emitter with a deterministic jitter sequence.
    pub fn new(seed: u64, position: Vec3, velocity: Vec3, rate: f32) -> Self {
        Self {
            position,
            velocity,
            velocity_spread: Vec3::new(0.7, 0.5, 0.9),
            rate,
            pending: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Append the particles due after `dt` seconds, up to the group's
    /// capacity. Returns how many were spawned.
    ///
    /// Must not run while the group has a frame in flight.
    pub fn emit(&mut self, buffer: &mut ParticleBuffer, dt: f32) -> usize {
        self.pending += self.rate * dt;
        let begin = buffer.live_count();
        let mut end = begin + self.pending as usize;
        self.pending -= (end - begin) as f32;
        if end >= buffer.capacity() {
            end = buffer.capacity();
            self.pending = 0.0;
        }
        {
            let mut state = buffer.lock();
            for i in begin..end {
                let jitter = Vec3::new(
                    self.rng.random_range(-1.0..=1.0),
                    self.rng.random_range(-1.0..=1.0),
                    self.rng.random_range(-1.0..=1.0),
                ) * self.velocity_spread;
                state.positions[i] = self.position;
                state.velocities[i] = self.velocity + jitter;
            }
        }
        for i in begin..end {
            buffer.forces().set(i, Vec3::ZERO);
        }
        buffer.set_live_count(end);
        end - begin
    }
}

/// Integrate every live particle over `dt` and stream the result.
///
/// The previous frame's impulse acts as an acceleration alongside
/// `acceleration`, applied in two half steps around the position update.
/// Integrates from a copy of the state, so a constraint job can lock the
/// buffer and write back while this is still streaming.
pub fn step_group(ctx: &mut AsyncContext, buffer: &ParticleBuffer, dt: f32, acceleration: Vec3) {
    let half = dt * 0.5;
    let state = buffer.lock().clone();
    for i in 0..buffer.live_count() {
        let half_accel = buffer.forces().get(i) * half + acceleration * half;
        let mut velocity = state.velocities[i] + half_accel;
        let position = state.positions[i] + velocity * dt;
        velocity += half_accel;
        ctx.submit_query(i, position, velocity);
    }
}

/// Two emitters aimed across each other above the ground plane, each
/// with its own group of `capacity` particles.
pub fn pointfall_profile(seed: u64, capacity: usize) -> Vec<(Emitter, ParticleBuffer)> {
    vec![
        (
            Emitter::new(
                seed,
                Vec3::new(-17.4, 12.4, 0.1),
                Vec3::new(11.4, 4.6, 0.1),
                417.0,
            ),
            ParticleBuffer::with_capacity(capacity),
        ),
        (
            Emitter::new(
                seed.wrapping_add(1),
                Vec3::new(3.0, 15.4, 0.0),
                Vec3::new(-3.0, -0.6, 0.0),
                300.0,
            ),
            ParticleBuffer::with_capacity(capacity),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitter_accumulates_fractional_particles() {
        let mut buffer = ParticleBuffer::with_capacity(100);
        let mut emitter = Emitter::new(1, Vec3::ZERO, Vec3::X, 30.0);
        assert_eq!(emitter.emit(&mut buffer, 0.05), 1);
        assert_eq!(emitter.emit(&mut buffer, 0.05), 2);
        assert_eq!(buffer.live_count(), 3);
    }

    #[test]
    fn step_group_streams_while_floor_writes_back() {
        let solver = flux_test_utils::test_solver(2, flux_core::CollisionParams::new(0.01, 2));
        let positions: Vec<Vec3> = (0..64).map(|i| Vec3::new(i as f32 * 5.0, -0.5, 0.0)).collect();
        let buffer = ParticleBuffer::from_particles(&positions, &[Vec3::new(0.0, -3.0, 0.0); 64]);

        solver.begin_batch(None);
        let mut ctx = solver.begin_async(&buffer, 0.01, Some(flux_core::Constraint::floor()));
        step_group(&mut ctx, &buffer, 0.01, Vec3::ZERO);
        solver.end_batch();
        let report = solver.await_completion();

        assert_eq!(report.constraint_contacts, 64);
        let state = buffer.lock();
        assert!(state.positions.iter().all(|p| (p.y - 0.2).abs() < 1e-5));
        assert!(state.velocities.iter().all(|v| v.y > 0.0));
    }

    #[test]
    fn emitter_stops_at_capacity() {
        let mut buffer = ParticleBuffer::with_capacity(10);
        let mut emitter = Emitter::new(1, Vec3::ZERO, Vec3::X, 1000.0);
        assert_eq!(emitter.emit(&mut buffer, 1.0), 10);
        assert_eq!(emitter.emit(&mut buffer, 1.0), 0);
        assert_eq!(buffer.live_count(), 10);
    }

    #[test]
    fn emitted_particles_start_at_the_emitter() {
        let mut buffer = ParticleBuffer::with_capacity(8);
        let origin = Vec3::new(1.0, 2.0, 3.0);
        let mut emitter = Emitter::new(7, origin, Vec3::ZERO, 100.0);
        emitter.emit(&mut buffer, 0.05);
        let state = buffer.lock();
        for i in 0..buffer.live_count() {
            assert_eq!(state.positions[i], origin);
            assert!(state.velocities[i].abs().cmple(emitter.velocity_spread).all());
        }
    }
}
