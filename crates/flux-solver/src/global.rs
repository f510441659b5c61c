//! Cross-group resolution and frame settlement.
//!
//! The [`GlobalSolver`] owns everything that is scoped to one frame: the
//! frame arena, the query table and the job counter. Each group that
//! finishes its broad-phase sort is registered with
//! [`submit`](GlobalSolver::submit) as the next query; query `N` then
//! spawns one pair job against each of queries `0..N`, so every pair of
//! groups in the frame is resolved exactly once, by whichever of the two
//! registered second.

use std::sync::Arc;

use flux_arena::{ArenaConfig, ArenaError, FrameArena, FrameLease};
use flux_core::search::lower_bound_by;
use flux_core::{CollisionParams, CollisionTunables, FrameId};
use parking_lot::{Mutex, RwLock};

use crate::buffer::ImpulseBuffer;
use crate::dispatch::Dispatch;
use crate::frame::{FrameReport, FrameTracker};
use crate::local::LocalSolver;
use crate::workspace::Workspace;

/// A group registered for cross-group resolution this frame.
#[derive(Debug)]
struct Query {
    results: Arc<ImpulseBuffer>,
    workspace: Arc<Workspace>,
    solver: Arc<LocalSolver>,
}

/// Frame-scoped owner of the arena, query table and job accounting.
#[derive(Debug)]
pub struct GlobalSolver {
    arena: Arc<FrameArena>,
    queries: RwLock<Vec<Arc<Query>>>,
    participants: Mutex<Vec<Arc<LocalSolver>>>,
    tracker: FrameTracker,
    global_job_margin: usize,
}

impl GlobalSolver {
    /// Allocate the frame arena and an empty query table.
    pub fn new(
        arena: &ArenaConfig,
        query_capacity: usize,
        global_job_margin: usize,
    ) -> Result<Self, ArenaError> {
        Ok(Self {
            arena: FrameArena::new(arena)?,
            queries: RwLock::new(Vec::with_capacity(query_capacity)),
            participants: Mutex::new(Vec::with_capacity(query_capacity)),
            tracker: FrameTracker::default(),
            global_job_margin,
        })
    }

    /// A scoped slice of `capacity` words from the frame arena, valid
    /// until the frame settles.
    ///
    /// # Panics
    ///
    /// Panics if the arena is exhausted.
    pub fn frame_buffer(&self, capacity: usize) -> FrameLease {
        self.arena.lease(capacity)
    }

    /// The frame arena.
    pub fn arena(&self) -> &Arc<FrameArena> {
        &self.arena
    }

    /// Queries registered so far this frame.
    pub fn query_count(&self) -> usize {
        self.queries.read().len()
    }

    /// Jobs issued this frame and not yet awaited.
    pub fn jobs_in_flight(&self) -> usize {
        self.tracker.issued()
    }

    /// Queue a job that the frame barrier waits for, counted as
    /// outstanding work of each of `owners` until it finishes.
    ///
    /// Must be called from the thread opening the frame or from a job
    /// already issued in it.
    pub(crate) fn issue<F>(
        self: &Arc<Self>,
        dispatch: &Dispatch,
        owners: Vec<Arc<LocalSolver>>,
        work: F,
        name: &'static str,
        end_margin: Option<usize>,
    ) where
        F: FnOnce() + Send + 'static,
    {
        self.tracker.issue();
        for owner in &owners {
            owner.add_work();
        }
        let this = Arc::clone(self);
        dispatch.queue(
            move || {
                work();
                for owner in &owners {
                    owner.finish_work();
                }
                this.tracker.complete();
            },
            name,
            end_margin,
        );
    }

    pub(crate) fn register_participant(&self, solver: Arc<LocalSolver>) {
        self.participants.lock().push(solver);
    }

    pub(crate) fn record_local(&self, collisions: u32) {
        self.tracker.add_local(collisions);
    }

    pub(crate) fn record_constraint(&self, contacts: u32) {
        self.tracker.add_constraint(contacts);
    }

    /// Register `solver`'s sorted workspace as the next query and spawn
    /// its pair jobs. Zeroes `results` first. Returns the query index.
    ///
    /// The solver's broad-phase index must be complete. Must be called
    /// from a job of the current frame.
    ///
    /// # Panics
    ///
    /// Panics if `solver` has no workspace this frame or `results` is
    /// smaller than it.
    pub fn submit(
        self: &Arc<Self>,
        solver: &Arc<LocalSolver>,
        results: Arc<ImpulseBuffer>,
        elapsed: f32,
        tunables: &Arc<CollisionTunables>,
        dispatch: &Dispatch,
    ) -> usize {
        let Some(workspace) = solver.workspace() else {
            tracing::error!(group = %solver.id(), "submit without an active frame");
            panic!("group {} submitted without an active frame", solver.id());
        };
        if results.capacity() < workspace.capacity() {
            tracing::error!(
                group = %solver.id(),
                results = results.capacity(),
                entities = workspace.capacity(),
                "results buffer smaller than group"
            );
            panic!(
                "results buffer holds {} entities, group {} streamed {}",
                results.capacity(),
                solver.id(),
                workspace.capacity()
            );
        }
        results.clear(workspace.capacity());

        let query = Arc::new(Query {
            results,
            workspace,
            solver: Arc::clone(solver),
        });
        let (index, earlier) = {
            let mut queries = self.queries.write();
            let earlier = queries.clone();
            queries.push(Arc::clone(&query));
            (earlier.len(), earlier)
        };
        tracing::trace!(group = %solver.id(), index, elapsed, "query registered");

        for prior in earlier {
            let this = Arc::clone(self);
            let current = Arc::clone(&query);
            let tunables = Arc::clone(tunables);
            self.tracker.add_inter_query_job();
            let owners = vec![Arc::clone(&prior.solver), Arc::clone(solver)];
            self.issue(
                dispatch,
                owners,
                move || {
                    let hits = resolve_pair(
                        &prior.workspace,
                        &prior.results,
                        &current.workspace,
                        &current.results,
                        &tunables.global,
                    );
                    tracing::trace!(
                        a = %prior.solver.id(),
                        b = %current.solver.id(),
                        hits,
                        "pair resolved"
                    );
                    this.tracker.add_global(hits);
                },
                "flux-inter-query",
                Some(self.global_job_margin),
            );
        }
        index
    }

    /// Block until every job issued this frame has completed, then return
    /// every participating solver to idle, clear the query table and
    /// reset the arena.
    ///
    /// # Panics
    ///
    /// Panics if arena leases are still held once all jobs are done,
    /// which means scratch escaped the frame.
    pub fn await_completion(&self, frame: FrameId) -> FrameReport {
        let jobs = self.tracker.await_all();
        let participants = std::mem::take(&mut *self.participants.lock());
        let queries = {
            let mut queries = self.queries.write();
            let n = queries.len();
            queries.clear();
            n
        };
        for solver in &participants {
            solver.release();
        }
        if let Err(e) = self.arena.reset() {
            tracing::error!(error = %e, %frame, "frame scratch outlived its frame");
            panic!("{e}");
        }
        let report = self.tracker.take_report(frame, queries, jobs);
        tracing::debug!(
            frame = %report.frame,
            queries = report.queries,
            jobs = report.jobs,
            inter_query_jobs = report.inter_query_jobs,
            local = report.local_collisions,
            global = report.global_collisions,
            constraint = report.constraint_contacts,
            "frame settled"
        );
        report
    }
}

/// Resolve contacts between two sorted groups.
///
/// Walks `a` from its far end. For each entry, binary-searches `b` for
/// the first key not below `key - radius²`, then scans forward while the
/// key difference stays within `radius²`, up to `candidate_window`
/// candidates and `max_per_entity` contacts. The exact 3-D test is
/// strict. Stops after `max_total` contacts. Returns the contact count.
pub fn resolve_pair(
    a: &Workspace,
    a_results: &ImpulseBuffer,
    b: &Workspace,
    b_results: &ImpulseBuffer,
    params: &CollisionParams,
) -> u32 {
    let r2 = params.radius_sq;
    let b_len = b.capacity();
    let mut total = 0u32;
    for rank in (0..a.capacity()).rev() {
        let ea = a.sorted(rank);
        let pa = a.position(ea.index as usize);
        let va = a.velocity(ea.index as usize);
        let floor = ea.distance - r2;
        let start = lower_bound_by(b_len, |k| b.sorted(k).distance < floor);

        let mut hits = 0u32;
        for eb in (start..b_len)
            .take(params.candidate_window as usize)
            .map(|k| b.sorted(k))
        {
            if hits >= params.max_per_entity || eb.distance - ea.distance > r2 {
                break;
            }
            let pb = b.position(eb.index as usize);
            let separation = pa - pb;
            if separation.length_squared() >= r2 {
                continue;
            }
            let vb = b.velocity(eb.index as usize);
            let n = separation.normalize_or_zero();
            let impulse = -n * n.dot(vb - va) / params.impulse_factor;
            a_results.accumulate(ea.index as usize, -impulse);
            b_results.accumulate(eb.index as usize, impulse);
            hits += 1;
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
    use flux_core::Vec3;

    fn sorted_workspace(arena: &Arc<FrameArena>, points: &[Vec3], velocities: &[Vec3]) -> Workspace {
        Workspace::from_particles(arena, points, velocities)
    }

    #[test]
    fn scenario_pair_yields_two_contacts() {
        let arena = FrameArena::new(&ArenaConfig::new(256)).unwrap();
        let a = sorted_workspace(
            &arena,
            &[Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)],
            &[Vec3::ZERO; 3],
        );
        let b = sorted_workspace(&arena, &[Vec3::new(0.05, 0.0, 0.0)], &[Vec3::new(-1.0, 0.0, 0.0)]);
        let (ra, rb) = (ImpulseBuffer::new(3, 4), ImpulseBuffer::new(1, 4));
        let hits = resolve_pair(&a, &ra, &b, &rb, &CollisionParams::new(1.2, 2));
        assert_eq!(hits, 2);
        assert_eq!(ra.get(2), Vec3::ZERO);
        let net = ra.get(0) + ra.get(1) + rb.get(0);
        assert!(net.length() < 1e-5, "net impulse {net:?}");
    }

    #[test]
    fn per_entity_cap_limits_contacts() {
        let arena = FrameArena::new(&ArenaConfig::new(256)).unwrap();
        let a = sorted_workspace(&arena, &[Vec3::ZERO], &[Vec3::ZERO]);
        let b_points: Vec<Vec3> = (1..=5).map(|i| Vec3::splat(i as f32 * 0.01)).collect();
        let b = sorted_workspace(&arena, &b_points, &[Vec3::ZERO; 5]);
        let (ra, rb) = (ImpulseBuffer::new(1, 4), ImpulseBuffer::new(5, 4));
        assert_eq!(
            resolve_pair(&a, &ra, &b, &rb, &CollisionParams::new(1.2, 2)),
            2
        );
        assert_eq!(
            resolve_pair(&a, &ra, &b, &rb, &CollisionParams::new(1.2, 8)),
            5
        );
    }

    #[test]
    fn candidate_window_bounds_scan() {
        let arena = FrameArena::new(&ArenaConfig::new(256)).unwrap();
        let a = sorted_workspace(&arena, &[Vec3::ZERO], &[Vec3::ZERO]);
        let b_points: Vec<Vec3> = (1..=5).map(|i| Vec3::splat(i as f32 * 0.01)).collect();
        let b = sorted_workspace(&arena, &b_points, &[Vec3::ZERO; 5]);
        let (ra, rb) = (ImpulseBuffer::new(1, 4), ImpulseBuffer::new(5, 4));
        let params = CollisionParams {
            candidate_window: 3,
            ..CollisionParams::new(1.2, 8)
        };
        assert_eq!(resolve_pair(&a, &ra, &b, &rb, &params), 3);
    }

    #[test]
    fn far_groups_do_not_touch() {
        let arena = FrameArena::new(&ArenaConfig::new(256)).unwrap();
        let a = sorted_workspace(&arena, &[Vec3::ZERO], &[Vec3::ZERO]);
        let b = sorted_workspace(&arena, &[Vec3::splat(10.0)], &[Vec3::ZERO]);
        let (ra, rb) = (ImpulseBuffer::new(1, 4), ImpulseBuffer::new(1, 4));
        assert_eq!(
            resolve_pair(&a, &ra, &b, &rb, &CollisionParams::default()),
            0
        );
    }

    #[test]
    fn settle_with_no_queries_is_empty() {
        let global = GlobalSolver::new(&ArenaConfig::new(64), 4, 3).unwrap();
        let lease = global.frame_buffer(8);
        assert_eq!(lease.len(), 8);
        drop(lease);
        let report = global.await_completion(FrameId(1));
        assert_eq!(report.queries, 0);
        assert_eq!(report.jobs, 0);
        assert_eq!(global.arena().used(), 0);
    }

    #[test]
    #[should_panic(expected = "leases outstanding")]
    fn settle_with_escaped_scratch_is_fatal() {
        let global = GlobalSolver::new(&ArenaConfig::new(64), 4, 3).unwrap();
        let _lease = global.frame_buffer(8);
        global.await_completion(FrameId(1));
    }
}
