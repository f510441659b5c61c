//! The [`CollisionSolver`] facade.

use std::sync::Arc;

use flux_core::{CollisionTunables, Constraint, FrameId, TunablesError};
use flux_jobs::{JobGroup, JobScheduler, SchedulerConfig};
use parking_lot::Mutex;

use crate::buffer::ParticleBuffer;
use crate::config::SolverConfig;
use crate::constraint_runner::ConstraintRunner;
use crate::context::AsyncContext;
use crate::dispatch::Dispatch;
use crate::error::SolverError;
use crate::frame::FrameReport;
use crate::global::GlobalSolver;
use crate::local::{resolve_local, SolverPhase};
use crate::registry::SolverRegistry;
use crate::reload::TunablesSource;
use crate::workspace::Workspace;

struct FrameState {
    current: FrameId,
    open: bool,
    /// Frame with issued work that has not been settled yet.
    unsettled: Option<FrameId>,
    dispatch: Dispatch,
    tunables: Arc<CollisionTunables>,
    source: Option<Box<dyn TunablesSource>>,
    last_report: Option<FrameReport>,
}

impl FrameState {
    fn poll_tunables(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        match source.poll() {
            Ok(None) => {}
            Ok(Some(tunables)) => match tunables.validate() {
                Ok(()) => {
                    tracing::debug!(?tunables, "tunables reloaded");
                    self.tunables = Arc::new(tunables);
                }
                Err(e) => tracing::warn!(error = %e, "rejected reloaded tunables"),
            },
            Err(e) => {
                tracing::warn!(error = %e, "tunables reload failed; keeping previous values");
            }
        }
    }
}

/// Frame-bracketed entry point to the collision pipeline.
///
/// ```text
/// begin_batch(group?)
///   for each particle group:
///     ctx = begin_async(buffer, elapsed, constraint?)
///     integrate; ctx.submit_query(i, pos, vel) per entity
/// end_batch()
/// ... read buffer.forces() after await_query_completion(buffer)
/// ```
///
/// Settlement is pipelined: `begin_batch` never blocks, and the previous
/// frame is settled by the first `begin_async` of the next one, or
/// explicitly by [`await_completion`](Self::await_completion).
/// [`await_query_completion`](Self::await_query_completion) waits on one
/// group's jobs only and never settles.
pub struct CollisionSolver {
    config: SolverConfig,
    scheduler: Arc<JobScheduler>,
    registry: SolverRegistry,
    global: Arc<GlobalSolver>,
    frame: Mutex<FrameState>,
}

impl CollisionSolver {
    /// Solver dispatching onto an existing pool.
    pub fn new(config: SolverConfig, scheduler: Arc<JobScheduler>) -> Result<Self, SolverError> {
        config.validate()?;
        let global = GlobalSolver::new(
            &config.arena,
            config.query_capacity,
            config.global_job_margin,
        )
        .map_err(crate::error::ConfigError::from)?;
        let frame = FrameState {
            current: FrameId::default(),
            open: false,
            unsettled: None,
            dispatch: Dispatch::Scheduler(Arc::clone(&scheduler)),
            tunables: Arc::new(config.tunables.clone()),
            source: None,
            last_report: None,
        };
        Ok(Self {
            config,
            scheduler,
            registry: SolverRegistry::new(),
            global: Arc::new(global),
            frame: Mutex::new(frame),
        })
    }

    /// Solver with its own pool.
    pub fn with_scheduler_config(
        config: SolverConfig,
        scheduler: SchedulerConfig,
    ) -> Result<Self, SolverError> {
        let scheduler = Arc::new(JobScheduler::new(scheduler)?);
        Self::new(config, scheduler)
    }

    /// Install the hook polled by every `begin_batch`.
    pub fn set_tunables_source(&self, source: Box<dyn TunablesSource>) {
        self.frame.lock().source = Some(source);
    }

    /// Replace the tunables for frames begun from now on.
    pub fn set_tunables(&self, tunables: CollisionTunables) -> Result<(), TunablesError> {
        tunables.validate()?;
        self.frame.lock().tunables = Arc::new(tunables);
        Ok(())
    }

    /// Tunables in effect.
    pub fn tunables(&self) -> Arc<CollisionTunables> {
        Arc::clone(&self.frame.lock().tunables)
    }

    /// The configuration the solver was built with.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The worker pool.
    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    /// Per-group solvers seen so far.
    pub fn registry(&self) -> &SolverRegistry {
        &self.registry
    }

    /// Frame-scoped cross-group state.
    pub fn global(&self) -> &Arc<GlobalSolver> {
        &self.global
    }

    /// The most recently opened frame.
    pub fn current_frame(&self) -> FrameId {
        self.frame.lock().current
    }

    /// Report of the most recently settled frame.
    pub fn last_report(&self) -> Option<FrameReport> {
        self.frame.lock().last_report.clone()
    }

    /// Open a frame. Jobs go through `job_group` when given, otherwise
    /// straight onto the pool. Polls the tunables source.
    ///
    /// Does not wait for the previous frame.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already open.
    pub fn begin_batch(&self, job_group: Option<Arc<JobGroup>>) -> FrameId {
        let mut frame = self.frame.lock();
        if frame.open {
            tracing::error!(frame = %frame.current, "begin_batch while a frame is open");
            panic!("begin_batch called while frame {} is open", frame.current);
        }
        frame.current = frame.current.next();
        frame.open = true;
        frame.dispatch = match job_group {
            Some(group) => Dispatch::Group(group),
            None => Dispatch::Scheduler(Arc::clone(&self.scheduler)),
        };
        frame.poll_tunables();
        frame.current
    }

    /// Start streaming `buffer`'s live entities for this frame.
    ///
    /// Settles the previous frame first if it has not been settled.
    /// `elapsed` is the
    /// frame's time step, carried for diagnostics. When a constraint is
    /// given it is applied to the entities as they stream, writing the
    /// constrained state back into `buffer`.
    ///
    /// # Panics
    ///
    /// Panics outside `begin_batch`/`end_batch`, if the group was already
    /// begun in this frame, or if the frame arena cannot hold the group.
    pub fn begin_async(
        &self,
        buffer: &ParticleBuffer,
        elapsed: f32,
        constraint: Option<Constraint>,
    ) -> AsyncContext {
        let mut frame = self.frame.lock();
        if !frame.open {
            tracing::error!(group = %buffer.id(), "begin_async outside a frame");
            panic!("begin_async for group {} outside begin_batch/end_batch", buffer.id());
        }
        if frame.unsettled.is_some_and(|f| f != frame.current) {
            self.settle(&mut frame);
        }
        let solver = self.registry.acquire(buffer.id());
        if !solver.is_idle() {
            tracing::error!(
                group = %buffer.id(),
                frame = %frame.current,
                "group begun twice in one frame"
            );
            panic!(
                "group {} already begun in frame {}",
                buffer.id(),
                frame.current
            );
        }
        frame.unsettled = Some(frame.current);

        let workspace = Arc::new(Workspace::new(self.global.arena(), buffer.live_count()));
        solver.begin(Arc::clone(&workspace));
        self.global.register_participant(Arc::clone(&solver));

        let local_job = {
            let solver = Arc::clone(&solver);
            let workspace = Arc::clone(&workspace);
            let results = Arc::clone(buffer.forces());
            let global = Arc::clone(&self.global);
            let tunables = Arc::clone(&frame.tunables);
            let dispatch = frame.dispatch.clone();
            let strategy = self.config.sort;
            move || {
                let sorted = solver.consume_sorted(&workspace, strategy);
                workspace.store_sorted(&sorted);
                global.submit(&solver, Arc::clone(&results), elapsed, &tunables, &dispatch);
                solver.set_phase(SolverPhase::Resolving);
                let hits = resolve_local(&workspace, &sorted, &tunables.local, &results);
                global.record_local(hits);
                solver.set_phase(SolverPhase::Done);
            }
        };
        self.global.issue(
            &frame.dispatch,
            vec![Arc::clone(&solver)],
            local_job,
            "flux-local",
            None,
        );

        if let Some(constraint) = constraint {
            solver.set_constraint_running(true);
            let runner = ConstraintRunner::new(
                constraint,
                Arc::clone(buffer.state()),
                Arc::clone(&solver),
                Arc::clone(&workspace),
            );
            let global = Arc::clone(&self.global);
            let group = buffer.id();
            self.global.issue(
                &frame.dispatch,
                vec![Arc::clone(&solver)],
                move || match runner.run() {
                    Ok(contacts) => global.record_constraint(contacts),
                    Err(e) => tracing::warn!(%group, error = %e, "constraint skipped"),
                },
                "flux-constraint",
                None,
            );
        }

        AsyncContext::new(solver, workspace)
    }

    /// Close the frame. Does not wait for its jobs.
    ///
    /// # Panics
    ///
    /// Panics if no frame is open.
    pub fn end_batch(&self) {
        let mut frame = self.frame.lock();
        if !frame.open {
            tracing::error!("end_batch without begin_batch");
            panic!("end_batch called with no open frame");
        }
        frame.open = false;
    }

    /// Block until every job issued against `buffer`'s group so far has
    /// finished: its sort and same-group pass, its constraint, and its
    /// pair jobs against groups registered before it.
    ///
    /// Waits on that group alone. The frame is not settled, so groups that
    /// register later in the same frame still pair with it and add their
    /// contacts when they do. Returns immediately for an unknown group or
    /// one with nothing outstanding.
    pub fn await_query_completion(&self, buffer: &ParticleBuffer) {
        if let Some(solver) = self.registry.get(buffer.id()) {
            solver.wait_drained();
        }
    }

    /// Settle any unsettled frame and return its report.
    ///
    /// With nothing to settle, returns an empty report for the current
    /// frame.
    pub fn await_completion(&self) -> FrameReport {
        let mut frame = self.frame.lock();
        self.settle(&mut frame).unwrap_or_else(|| FrameReport {
            frame: frame.current,
            ..FrameReport::default()
        })
    }

    fn settle(&self, frame: &mut FrameState) -> Option<FrameReport> {
        let id = frame.unsettled.take()?;
        let report = self.global.await_completion(id);
        frame.last_report = Some(report.clone());
        Some(report)
    }
}

impl Drop for CollisionSolver {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let frame = self.frame.get_mut();
        if let Some(id) = frame.unsettled.take() {
            self.global.await_completion(id);
        }
    }
}

impl std::fmt::Debug for CollisionSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let frame = self.frame.lock();
        f.debug_struct("CollisionSolver")
            .field("frame", &frame.current)
            .field("open", &frame.open)
            .field("unsettled", &frame.unsettled)
            .field("groups", &self.registry.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

// Compile-time assertion: the facade is shared with integration threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<CollisionSolver>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use flux_core::Vec3;

    fn solver() -> CollisionSolver {
        CollisionSolver::with_scheduler_config(
            SolverConfig::default(),
            SchedulerConfig::with_workers(2),
        )
        .unwrap()
    }

    #[test]
    fn frame_ids_advance() {
        let s = solver();
        assert_eq!(s.begin_batch(None), FrameId(1));
        s.end_batch();
        assert_eq!(s.begin_batch(None), FrameId(2));
        s.end_batch();
    }

    #[test]
    #[should_panic(expected = "outside begin_batch")]
    fn begin_async_outside_frame_is_fatal() {
        let s = solver();
        let buffer = ParticleBuffer::with_capacity(1);
        let _ctx = s.begin_async(&buffer, 0.016, None);
    }

    #[test]
    #[should_panic(expected = "is open")]
    fn nested_begin_batch_is_fatal() {
        let s = solver();
        s.begin_batch(None);
        s.begin_batch(None);
    }

    #[test]
    fn empty_group_completes() {
        let s = solver();
        let buffer = ParticleBuffer::with_capacity(4);
        s.begin_batch(None);
        let ctx = s.begin_async(&buffer, 0.016, None);
        assert!(ctx.is_complete());
        drop(ctx);
        s.end_batch();
        let report = s.await_completion();
        assert_eq!(report.queries, 1);
        assert_eq!(report.total_collisions(), 0);
    }

    #[test]
    fn waiting_on_unknown_group_returns() {
        let s = solver();
        s.await_query_completion(&ParticleBuffer::with_capacity(2));
        assert!(s.registry().is_empty());
    }

    #[test]
    fn set_tunables_validates() {
        let s = solver();
        let mut t = CollisionTunables::default();
        t.global.radius_sq = 0.0;
        assert!(s.set_tunables(t).is_err());
        let mut t = CollisionTunables::default();
        t.global.radius_sq = 2.0;
        s.set_tunables(t).unwrap();
        assert_eq!(s.tunables().global.radius_sq, 2.0);
    }

    #[test]
    fn drop_settles_unsettled_frame() {
        let s = solver();
        let buffer = ParticleBuffer::from_particles(&[Vec3::ZERO, Vec3::X * 0.1], &[Vec3::ZERO; 2]);
        s.begin_batch(None);
        let mut ctx = s.begin_async(&buffer, 0.016, None);
        ctx.submit_query(0, Vec3::ZERO, Vec3::ZERO);
        ctx.submit_query(1, Vec3::X * 0.1, Vec3::ZERO);
        s.end_batch();
        let solver = s.registry().get(buffer.id()).unwrap();
        drop(s);
        assert!(solver.is_idle());
    }
}
