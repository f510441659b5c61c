//! Per-group solver state and same-group resolution.
//!
//! A [`LocalSolver`] is created the first time a group is seen and reused
//! every frame after. Its lifecycle within a frame:
//!
//! ```text
//! Idle ──begin──► Reading ──all entries sorted──► Sorting ──submit──► Resolving
//!   ▲                                                                     │
//!   └──────────────────────── release (frame settled) ◄── Done ◄──────────┘
//! ```
//!
//! The caller advances `revision` as it streams entries; the sort job
//! consumes entries strictly below the revision, so it never reads a slot
//! the caller has not published.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::Backoff;
use flux_core::search::binary_insert_sorted;
use flux_core::{CollisionParams, DistanceIndex, GroupId};
use flux_jobs::{Event, Pending};
use parking_lot::RwLock;

use crate::buffer::ImpulseBuffer;
use crate::config::SortStrategy;
use crate::workspace::Workspace;

/// Where a [`LocalSolver`] is in its frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SolverPhase {
    /// No frame in flight.
    Idle = 0,
    /// The caller is streaming entries.
    Reading = 1,
    /// Streaming finished; the broad-phase index is being finalized.
    Sorting = 2,
    /// Same-group contacts are being resolved.
    Resolving = 3,
    /// This group's own jobs are done; waiting for the frame to settle.
    Done = 4,
}

impl SolverPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Reading,
            2 => Self::Sorting,
            3 => Self::Resolving,
            4 => Self::Done,
            _ => Self::Idle,
        }
    }
}

/// Scratch state and broad-phase of one particle group.
#[derive(Debug)]
pub struct LocalSolver {
    id: GroupId,
    workspace: RwLock<Option<Arc<Workspace>>>,
    revision: AtomicUsize,
    capacity: AtomicUsize,
    phase: AtomicU8,
    idle: Event,
    /// Jobs touching this group's results: its own local and constraint
    /// jobs plus every pair job it takes part in.
    work: Pending,
    constraint_running: AtomicBool,
}

impl LocalSolver {
    /// Idle solver for group `id`.
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            workspace: RwLock::new(None),
            revision: AtomicUsize::new(0),
            capacity: AtomicUsize::new(0),
            phase: AtomicU8::new(SolverPhase::Idle as u8),
            idle: Event::new(true),
            work: Pending::default(),
            constraint_running: AtomicBool::new(false),
        }
    }

    /// The group this solver belongs to.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Current phase.
    pub fn phase(&self) -> SolverPhase {
        SolverPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether no frame is in flight for this group.
    pub fn is_idle(&self) -> bool {
        self.idle.is_set()
    }

    /// Block until the group's frame has settled.
    pub fn wait_idle(&self) {
        self.idle.wait();
    }

    /// Jobs issued against this group and not yet finished.
    pub fn outstanding_work(&self) -> usize {
        self.work.outstanding()
    }

    /// Block until every job issued against this group so far has
    /// finished. Pair jobs spawned later by groups that register after
    /// this returns are not waited for.
    pub fn wait_drained(&self) {
        self.work.wait_drained();
    }

    pub(crate) fn add_work(&self) {
        self.work.add();
    }

    pub(crate) fn finish_work(&self) {
        self.work.done();
    }

    /// Entries published by the caller so far this frame.
    pub fn revision(&self) -> usize {
        self.revision.load(Ordering::Acquire)
    }

    /// Entries expected this frame.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Whether a constraint job is running over this group.
    pub fn is_constraint_running(&self) -> bool {
        self.constraint_running.load(Ordering::Acquire)
    }

    /// This frame's workspace, if a frame is in flight.
    pub fn workspace(&self) -> Option<Arc<Workspace>> {
        self.workspace.read().clone()
    }

    pub(crate) fn begin(&self, workspace: Arc<Workspace>) {
        self.idle.reset();
        self.capacity.store(workspace.capacity(), Ordering::Release);
        self.revision.store(0, Ordering::Release);
        *self.workspace.write() = Some(workspace);
        self.set_phase(SolverPhase::Reading);
    }

    /// Publish entry `index`. Its lane data must already be written.
    pub(crate) fn publish(&self, index: usize) {
        self.revision.store(index + 1, Ordering::Release);
    }

    pub(crate) fn set_phase(&self, phase: SolverPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(crate) fn set_constraint_running(&self, running: bool) {
        self.constraint_running.store(running, Ordering::Release);
    }

    /// Return to the initial state and wake anyone waiting on idle.
    pub(crate) fn release(&self) {
        self.workspace.write().take();
        self.capacity.store(0, Ordering::Release);
        self.revision.store(0, Ordering::Release);
        self.constraint_running.store(false, Ordering::Release);
        self.set_phase(SolverPhase::Idle);
        self.idle.set();
    }

    /// Wait until entry `next` is published, spinning briefly and then
    /// yielding. Returns the revision observed.
    pub(crate) fn await_revision(&self, next: usize) -> usize {
        let backoff = Backoff::new();
        loop {
            let revealed = self.revision();
            if revealed > next {
                return revealed;
            }
            backoff.snooze();
        }
    }

    /// Build the broad-phase index as entries stream in.
    ///
    /// Returns once all `workspace.capacity()` entries have been consumed;
    /// the result is ascending by distance and a permutation of
    /// `0..capacity`.
    pub(crate) fn consume_sorted(
        &self,
        workspace: &Workspace,
        strategy: SortStrategy,
    ) -> Vec<DistanceIndex> {
        let capacity = workspace.capacity();
        let mut sorted = Vec::with_capacity(capacity);
        let mut next = 0;
        while next < capacity {
            let revealed = self.await_revision(next).min(capacity);
            for i in next..revealed {
                let entry = DistanceIndex::new(workspace.position(i), i as u32);
                match strategy {
                    SortStrategy::Bulk => sorted.push(entry),
                    SortStrategy::Incremental => {
                        binary_insert_sorted(&mut sorted, entry, DistanceIndex::ascending);
                    }
                }
            }
            next = revealed;
        }
        self.set_phase(SolverPhase::Sorting);
        if strategy == SortStrategy::Bulk {
            sorted.sort_unstable_by(DistanceIndex::ascending);
        }
        sorted
    }
}

/// Resolve contacts within one group.
///
/// Slides a window over the ascending index: for each rank `i`, ranks
/// `k > i` are visited while their key is within `radius²` of `i`'s and
/// at most `max_per_entity` ranks ahead. Pairs that pass the exact 3-D
/// test push apart along their separation axis, scaled by `1 / radius²`;
/// `impulse_factor` only applies across groups. Returns the number of
/// contacts resolved.
pub fn resolve_local(
    workspace: &Workspace,
    sorted: &[DistanceIndex],
    params: &CollisionParams,
    results: &ImpulseBuffer,
) -> u32 {
    let r2 = params.radius_sq;
    let window = params.max_per_entity as usize;
    let mut total = 0u32;
    for (i, ei) in sorted.iter().enumerate() {
        let pi = workspace.position(ei.index as usize);
        let vi = workspace.velocity(ei.index as usize);
        for ek in sorted.iter().skip(i + 1).take(window) {
            if ek.distance - ei.distance > r2 {
                break;
            }
            let pk = workspace.position(ek.index as usize);
            let separation = pi - pk;
            if separation.length_squared() > r2 {
                continue;
            }
            let vk = workspace.velocity(ek.index as usize);
            let n = separation.normalize_or_zero();
            let impulse = -n * n.dot(vk - vi) / r2;
            results.accumulate(ei.index as usize, -impulse);
            results.accumulate(ek.index as usize, impulse);
            total += 1;
            if total >= params.max_total {
                return total;
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_arena::{ArenaConfig, FrameArena};
    use flux_core::Vec3;

    fn streamed(points: &[Vec3], velocities: &[Vec3]) -> (LocalSolver, Arc<Workspace>) {
        let arena = FrameArena::new(&ArenaConfig::new(1024)).unwrap();
        let ws = Arc::new(Workspace::new(&arena, points.len()));
        let solver = LocalSolver::new(GroupId::next());
        solver.begin(Arc::clone(&ws));
        for (i, (p, v)) in points.iter().zip(velocities).enumerate() {
            ws.write_entry(i, *p, *v);
            solver.publish(i);
        }
        (solver, ws)
    }

    #[test]
    fn begin_and_release_round_trip_state() {
        let (solver, ws) = streamed(&[Vec3::X], &[Vec3::ZERO]);
        assert_eq!(solver.phase(), SolverPhase::Reading);
        assert!(!solver.is_idle());
        assert_eq!(solver.capacity(), 1);
        assert_eq!(solver.revision(), 1);
        drop(ws);
        solver.release();
        assert_eq!(solver.phase(), SolverPhase::Idle);
        assert!(solver.is_idle());
        assert_eq!(solver.capacity(), 0);
        assert_eq!(solver.revision(), 0);
        assert!(solver.workspace().is_none());
    }

    #[test]
    fn drained_tracks_outstanding_work() {
        let solver = LocalSolver::new(GroupId::next());
        solver.wait_drained();
        solver.add_work();
        solver.add_work();
        assert_eq!(solver.outstanding_work(), 2);
        solver.finish_work();
        solver.finish_work();
        solver.wait_drained();
        assert_eq!(solver.outstanding_work(), 0);
        assert!(solver.is_idle());
    }

    #[test]
    fn bulk_and_incremental_agree() {
        let points = [
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::ZERO,
        ];
        let (solver, ws) = streamed(&points, &[Vec3::ZERO; 4]);
        let bulk = solver.consume_sorted(&ws, SortStrategy::Bulk);
        let incremental = solver.consume_sorted(&ws, SortStrategy::Incremental);
        let order: Vec<u32> = bulk.iter().map(|e| e.index).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
        assert_eq!(bulk, incremental);
        assert_eq!(solver.phase(), SolverPhase::Sorting);
    }

    #[test]
    fn sort_waits_for_streaming_producer() {
        let arena = FrameArena::new(&ArenaConfig::new(1024)).unwrap();
        let ws = Arc::new(Workspace::new(&arena, 64));
        let solver = Arc::new(LocalSolver::new(GroupId::next()));
        solver.begin(Arc::clone(&ws));

        let consumer = {
            let (solver, ws) = (Arc::clone(&solver), Arc::clone(&ws));
            std::thread::spawn(move || solver.consume_sorted(&ws, SortStrategy::Incremental))
        };
        for i in 0..64 {
            ws.write_entry(i, Vec3::splat((64 - i) as f32), Vec3::ZERO);
            solver.publish(i);
            if i % 8 == 0 {
                std::thread::yield_now();
            }
        }
        let sorted = consumer.join().unwrap();
        assert_eq!(sorted.len(), 64);
        assert_eq!(sorted[0].index, 63);
        assert_eq!(sorted[63].index, 0);
    }

    #[test]
    fn local_resolve_pushes_pair_apart() {
        let points = [Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)];
        let velocities = [Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO, Vec3::ZERO];
        let (solver, ws) = streamed(&points, &velocities);
        let sorted = solver.consume_sorted(&ws, SortStrategy::Bulk);
        let results = ImpulseBuffer::new(3, 4);
        let params = CollisionParams::new(1.2, 2);
        assert_eq!(resolve_local(&ws, &sorted, &params, &results), 1);
        // Entity 0 moves toward entity 1; the impulse slows it and pushes 1 on.
        assert!(results.get(0).x < 0.0);
        assert!(results.get(1).x > 0.0);
        assert_eq!(results.get(0) + results.get(1), Vec3::ZERO);
        assert_eq!(results.get(2), Vec3::ZERO);
    }

    #[test]
    fn local_impulse_scales_by_inverse_radius_sq() {
        let points = [Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0)];
        let velocities = [Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO];
        let (solver, ws) = streamed(&points, &velocities);
        let sorted = solver.consume_sorted(&ws, SortStrategy::Bulk);
        let results = ImpulseBuffer::new(2, 4);
        let params = CollisionParams {
            impulse_factor: 7.0,
            ..CollisionParams::new(1.2, 2)
        };
        assert_eq!(resolve_local(&ws, &sorted, &params, &results), 1);
        assert!((results.get(0).x - (-1.0 / 1.2)).abs() < 1e-5, "{:?}", results.get(0));
        assert!((results.get(1).x - 1.0 / 1.2).abs() < 1e-5, "{:?}", results.get(1));
        assert_eq!(results.get(0).y, 0.0);
    }

    #[test]
    fn per_entity_window_caps_partners() {
        // Five entities strung along z, all within range of each other.
        let points: Vec<Vec3> = (0..5).map(|i| Vec3::new(0.0, 0.0, i as f32 * 0.01)).collect();
        let (solver, ws) = streamed(&points, &[Vec3::ZERO; 5]);
        let sorted = solver.consume_sorted(&ws, SortStrategy::Bulk);
        let results = ImpulseBuffer::new(5, 4);
        let params = CollisionParams::new(1.2, 2);
        // Ranks 0..3 see two partners each, rank 3 sees one, rank 4 none.
        assert_eq!(resolve_local(&ws, &sorted, &params, &results), 7);
    }

    #[test]
    fn total_cap_stops_pass() {
        let points: Vec<Vec3> = (0..5).map(|i| Vec3::new(0.0, 0.0, i as f32 * 0.01)).collect();
        let (solver, ws) = streamed(&points, &[Vec3::ZERO; 5]);
        let sorted = solver.consume_sorted(&ws, SortStrategy::Bulk);
        let results = ImpulseBuffer::new(5, 4);
        let params = CollisionParams {
            max_total: 3,
            ..CollisionParams::new(1.2, 2)
        };
        assert_eq!(resolve_local(&ws, &sorted, &params, &results), 3);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn coord() -> impl Strategy<Value = f32> {
            -100.0f32..100.0
        }

        proptest! {
            #[test]
            fn sorted_index_is_ascending_permutation(
                points in prop::collection::vec((coord(), coord(), coord()), 0..64),
                incremental in any::<bool>(),
            ) {
                let points: Vec<Vec3> = points.into_iter().map(|(x, y, z)| Vec3::new(x, y, z)).collect();
                let velocities = vec![Vec3::ZERO; points.len()];
                let (solver, ws) = streamed(&points, &velocities);
                let strategy = if incremental { SortStrategy::Incremental } else { SortStrategy::Bulk };
                let sorted = solver.consume_sorted(&ws, strategy);

                let mut seen: Vec<u32> = sorted.iter().map(|e| e.index).collect();
                seen.sort_unstable();
                prop_assert_eq!(seen, (0..points.len() as u32).collect::<Vec<_>>());
                prop_assert!(sorted.windows(2).all(|w| w[0].distance <= w[1].distance));
            }

            #[test]
            fn local_impulses_cancel(
                points in prop::collection::vec((-2.0f32..2.0, -2.0f32..2.0, -2.0f32..2.0), 2..32),
                velocity in (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0),
            ) {
                let points: Vec<Vec3> = points.into_iter().map(|(x, y, z)| Vec3::new(x, y, z)).collect();
                let mut velocities = vec![Vec3::ZERO; points.len()];
                velocities[0] = Vec3::new(velocity.0, velocity.1, velocity.2);
                let (solver, ws) = streamed(&points, &velocities);
                let sorted = solver.consume_sorted(&ws, SortStrategy::Bulk);
                let results = ImpulseBuffer::new(points.len(), 4);
                resolve_local(&ws, &sorted, &CollisionParams::new(1.2, 2), &results);
                let sum: Vec3 = results.to_vec(points.len()).into_iter().sum();
                prop_assert!(sum.length() < 1e-3, "net impulse {sum:?}");
            }
        }
    }
}
