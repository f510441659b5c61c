//! Caller-owned particle storage and the shared impulse accumulator.
//!
//! A [`ParticleBuffer`] is what a caller integrates every frame: parallel
//! position and velocity arrays plus the [`ImpulseBuffer`] the solver
//! writes resolved impulses into. Indices below `live_count` are live.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use flux_core::{GroupId, Vec3};
use flux_jobs::StripedLock;
use parking_lot::{Mutex, MutexGuard};

// ── ImpulseBuffer ──────────────────────────────────────────────────

/// Per-entity impulse accumulator shared between the caller and the
/// solver's jobs.
///
/// Every cell is three atomic `f32` words. Accumulation is a
/// read-modify-write under the stripe lock that owns the entity, so any
/// number of jobs may accumulate concurrently as long as they agree on
/// the stripe mapping.
#[derive(Debug)]
pub struct ImpulseBuffer {
    cells: Box<[AtomicU32]>,
    stripes: StripedLock,
}

impl ImpulseBuffer {
    /// Default number of lock stripes.
    pub const DEFAULT_STRIPES: usize = 64;

    /// Zeroed buffer for `capacity` entities.
    pub fn new(capacity: usize, stripes: usize) -> Self {
        Self {
            cells: (0..capacity * 3).map(|_| AtomicU32::new(0)).collect(),
            stripes: StripedLock::new(stripes),
        }
    }

    /// Number of entities.
    pub fn capacity(&self) -> usize {
        self.cells.len() / 3
    }

    /// Add `delta` to the impulse of entity `index`.
    #[inline]
    pub fn accumulate(&self, index: usize, delta: Vec3) {
        let _stripe = self.stripes.lock(index);
        let base = index * 3;
        for (axis, d) in delta.to_array().into_iter().enumerate() {
            let cell = &self.cells[base + axis];
            let v = f32::from_bits(cell.load(Ordering::Relaxed)) + d;
            cell.store(v.to_bits(), Ordering::Relaxed);
        }
    }

    /// The accumulated impulse of entity `index`.
    pub fn get(&self, index: usize) -> Vec3 {
        let base = index * 3;
        Vec3::new(
            f32::from_bits(self.cells[base].load(Ordering::Relaxed)),
            f32::from_bits(self.cells[base + 1].load(Ordering::Relaxed)),
            f32::from_bits(self.cells[base + 2].load(Ordering::Relaxed)),
        )
    }

    /// Overwrite the impulse of entity `index`.
    pub fn set(&self, index: usize, value: Vec3) {
        let _stripe = self.stripes.lock(index);
        let base = index * 3;
        for (axis, v) in value.to_array().into_iter().enumerate() {
            self.cells[base + axis].store(v.to_bits(), Ordering::Relaxed);
        }
    }

    /// Zero the first `count` entities.
    pub fn clear(&self, count: usize) {
        let end = (count * 3).min(self.cells.len());
        for cell in &self.cells[..end] {
            cell.store(0, Ordering::Relaxed);
        }
    }

    /// Copy of the first `count` impulses.
    pub fn to_vec(&self, count: usize) -> Vec<Vec3> {
        (0..count.min(self.capacity())).map(|i| self.get(i)).collect()
    }
}

// ── ParticleBuffer ─────────────────────────────────────────────────

/// Position and velocity arrays of one group.
#[derive(Clone, Debug, Default)]
pub struct ParticleState {
    /// Positions, one per entity.
    pub positions: Vec<Vec3>,
    /// Velocities, parallel to `positions`.
    pub velocities: Vec<Vec3>,
}

/// One particle group as owned by the caller.
///
/// The state sits behind a mutex because a constraint job may write
/// constrained positions back into it while the frame is in flight.
#[derive(Debug)]
pub struct ParticleBuffer {
    id: GroupId,
    state: Arc<Mutex<ParticleState>>,
    forces: Arc<ImpulseBuffer>,
    live_count: usize,
    capacity: usize,
}

impl ParticleBuffer {
    /// Empty group with a fresh [`GroupId`] and room for `capacity`
    /// entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_id(GroupId::next(), capacity)
    }

    /// Empty group with a caller-chosen id.
    pub fn with_id(id: GroupId, capacity: usize) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(ParticleState {
                positions: vec![Vec3::ZERO; capacity],
                velocities: vec![Vec3::ZERO; capacity],
            })),
            forces: Arc::new(ImpulseBuffer::new(capacity, ImpulseBuffer::DEFAULT_STRIPES)),
            live_count: 0,
            capacity,
        }
    }

    /// Group whose live entities are exactly `positions` and `velocities`.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn from_particles(positions: &[Vec3], velocities: &[Vec3]) -> Self {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "positions and velocities must be parallel"
        );
        let mut buffer = Self::with_capacity(positions.len());
        {
            let mut state = buffer.lock();
            state.positions.copy_from_slice(positions);
            state.velocities.copy_from_slice(velocities);
        }
        buffer.live_count = positions.len();
        buffer
    }

    /// The group's identity token.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Number of live entities.
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Maximum number of entities.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set the live count, clamped to capacity. Returns the new count.
    pub fn set_live_count(&mut self, count: usize) -> usize {
        self.live_count = count.min(self.capacity);
        self.live_count
    }

    /// Remove live entity `index` by moving the last live entity into its
    /// slot. Arrays stay parallel; the impulse moves with its entity.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not live.
    pub fn expire(&mut self, index: usize) {
        assert!(
            index < self.live_count,
            "expire({index}) out of live range {}",
            self.live_count
        );
        let last = self.live_count - 1;
        {
            let mut state = self.state.lock();
            state.positions.swap(index, last);
            state.velocities.swap(index, last);
        }
        let moved = self.forces.get(last);
        self.forces.set(index, moved);
        self.forces.set(last, Vec3::ZERO);
        self.live_count = last;
    }

    /// Change capacity, keeping the first `min(old, new)` entities.
    ///
    /// The impulse buffer is reallocated; queries still holding the old
    /// one keep it until the frame settles.
    pub fn resize(&mut self, capacity: usize) {
        {
            let mut state = self.state.lock();
            state.positions.resize(capacity, Vec3::ZERO);
            state.velocities.resize(capacity, Vec3::ZERO);
        }
        let forces = ImpulseBuffer::new(capacity, self.forces.stripes.stripe_count());
        for i in 0..capacity.min(self.capacity) {
            forces.set(i, self.forces.get(i));
        }
        self.forces = Arc::new(forces);
        self.capacity = capacity;
        self.live_count = self.live_count.min(capacity);
    }

    /// Lock the position and velocity arrays.
    pub fn lock(&self) -> MutexGuard<'_, ParticleState> {
        self.state.lock()
    }

    /// Shared handle to the state, for constraint write-back.
    pub fn state(&self) -> &Arc<Mutex<ParticleState>> {
        &self.state
    }

    /// The impulse accumulator.
    pub fn forces(&self) -> &Arc<ImpulseBuffer> {
        &self.forces
    }
}
