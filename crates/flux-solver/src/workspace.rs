//! Per-frame scratch lanes of one group.
//!
//! A [`Workspace`] is sliced from the frame arena when a group begins
//! streaming and lives until the frame settles. It holds three lanes:
//!
//! | lane        | words per entity | contents                     |
//! |-------------|------------------|------------------------------|
//! | positions   | 3                | streamed position            |
//! | velocities  | 3                | streamed velocity            |
//! | sorted      | 2                | distance bits, entity index  |

use std::sync::Arc;

use flux_arena::{FrameArena, FrameLease};
use flux_core::{DistanceIndex, Vec3};

/// Arena-backed scratch for one group for one frame.
#[derive(Debug)]
pub struct Workspace {
    positions: FrameLease,
    velocities: FrameLease,
    sorted: FrameLease,
    capacity: usize,
}

impl Workspace {
    /// Words of arena a workspace for `capacity` entities takes.
    pub const fn words_for(capacity: usize) -> usize {
        capacity * 8
    }

    /// Slice a workspace for `capacity` entities from `arena`.
    ///
    /// # Panics
    ///
    /// Panics if the arena is exhausted.
    pub fn new(arena: &Arc<FrameArena>, capacity: usize) -> Self {
        Self {
            positions: arena.lease(capacity * 3),
            velocities: arena.lease(capacity * 3),
            sorted: arena.lease(capacity * 2),
            capacity,
        }
    }

    /// A fully streamed and sorted workspace, for running
    /// [`resolve_local`](crate::resolve_local) and
    /// [`resolve_pair`](crate::resolve_pair) outside a frame.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length or the arena is exhausted.
    pub fn from_particles(arena: &Arc<FrameArena>, positions: &[Vec3], velocities: &[Vec3]) -> Self {
        assert_eq!(positions.len(), velocities.len());
        let ws = Self::new(arena, positions.len());
        let mut sorted = Vec::with_capacity(positions.len());
        for (i, (p, v)) in positions.iter().zip(velocities).enumerate() {
            ws.write_entry(i, *p, *v);
            sorted.push(DistanceIndex::new(*p, i as u32));
        }
        sorted.sort_unstable_by(DistanceIndex::ascending);
        ws.store_sorted(&sorted);
        ws
    }

    /// Number of entities.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The sorted broad-phase index as a vector.
    pub fn sorted_entries(&self) -> Vec<DistanceIndex> {
        (0..self.capacity).map(|rank| self.sorted(rank)).collect()
    }

    pub(crate) fn write_entry(&self, index: usize, position: Vec3, velocity: Vec3) {
        store_vec3(&self.positions, index, position);
        store_vec3(&self.velocities, index, velocity);
    }

    /// Streamed position of entity `index`.
    #[inline]
    pub fn position(&self, index: usize) -> Vec3 {
        load_vec3(&self.positions, index)
    }

    /// Streamed velocity of entity `index`.
    #[inline]
    pub fn velocity(&self, index: usize) -> Vec3 {
        load_vec3(&self.velocities, index)
    }

    /// Entry `rank` of the sorted broad-phase index.
    #[inline]
    pub fn sorted(&self, rank: usize) -> DistanceIndex {
        DistanceIndex {
            distance: self.sorted.load_f32(rank * 2),
            index: self.sorted.load(rank * 2 + 1),
        }
    }

    pub(crate) fn store_sorted(&self, entries: &[DistanceIndex]) {
        for (rank, entry) in entries.iter().enumerate() {
            self.sorted.store_f32(rank * 2, entry.distance);
            self.sorted.store(rank * 2 + 1, entry.index);
        }
    }
}

fn store_vec3(lane: &FrameLease, index: usize, v: Vec3) {
    let base = index * 3;
    lane.store_f32(base, v.x);
    lane.store_f32(base + 1, v.y);
    lane.store_f32(base + 2, v.z);
}

fn load_vec3(lane: &FrameLease, index: usize) -> Vec3 {
    let base = index * 3;
    Vec3::new(
        lane.load_f32(base),
        lane.load_f32(base + 1),
        lane.load_f32(base + 2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_arena::ArenaConfig;

    #[test]
    fn lanes_are_disjoint() {
        let arena = FrameArena::new(&ArenaConfig::new(64)).unwrap();
        let ws = Workspace::new(&arena, 4);
        assert_eq!(arena.used(), Workspace::words_for(4));
        ws.write_entry(3, Vec3::new(1.0, 2.0, 3.0), Vec3::splat(-1.0));
        ws.store_sorted(&[DistanceIndex {
            distance: 14.0,
            index: 3,
        }]);
        assert_eq!(ws.position(3), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(ws.velocity(3), Vec3::splat(-1.0));
        assert_eq!(ws.sorted(0).index, 3);
        assert_eq!(ws.sorted(0).distance, 14.0);
        assert_eq!(ws.position(0), Vec3::ZERO);
    }

    #[test]
    fn dropping_workspace_releases_leases() {
        let arena = FrameArena::new(&ArenaConfig::new(64)).unwrap();
        let ws = Workspace::new(&arena, 2);
        assert_eq!(arena.outstanding(), 3);
        drop(ws);
        assert!(arena.reset().is_ok());
    }

    #[test]
    fn from_particles_sorts_by_key() {
        let arena = FrameArena::new(&ArenaConfig::new(64)).unwrap();
        let points = [Vec3::splat(3.0), Vec3::ZERO, Vec3::X];
        let ws = Workspace::from_particles(&arena, &points, &[Vec3::ZERO; 3]);
        let order: Vec<u32> = ws.sorted_entries().iter().map(|e| e.index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(ws.position(0), Vec3::splat(3.0));
    }
}
