//! The caller's streaming handle.

use std::sync::Arc;

use flux_core::Vec3;

use crate::local::LocalSolver;
use crate::workspace::Workspace;

/// Streaming handle returned by
/// [`CollisionSolver::begin_async`](crate::CollisionSolver::begin_async).
///
/// The caller feeds every live entity of the group, in index order, from
/// its own integration loop. Each [`submit_query`](Self::submit_query)
/// publishes one entry to the background jobs.
///
/// Dropping a context before every entry has been submitted is fatal:
/// the group's jobs would wait for the missing entries forever.
#[derive(Debug)]
pub struct AsyncContext {
    solver: Arc<LocalSolver>,
    workspace: Option<Arc<Workspace>>,
    next: usize,
    capacity: usize,
}

impl AsyncContext {
    pub(crate) fn new(solver: Arc<LocalSolver>, workspace: Arc<Workspace>) -> Self {
        let capacity = workspace.capacity();
        Self {
            solver,
            workspace: (capacity > 0).then_some(workspace),
            next: 0,
            capacity,
        }
    }

    /// Publish the resolved state of entity `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or not the next index in order.
    pub fn submit_query(&mut self, index: usize, position: Vec3, velocity: Vec3) {
        if index >= self.capacity {
            tracing::error!(
                group = %self.solver.id(),
                index,
                capacity = self.capacity,
                "entity submitted beyond capacity"
            );
            panic!(
                "submit_query({index}) beyond capacity {} of group {}",
                self.capacity,
                self.solver.id()
            );
        }
        if index != self.next {
            tracing::error!(
                group = %self.solver.id(),
                index,
                expected = self.next,
                "entity submitted out of order"
            );
            panic!(
                "submit_query({index}) out of order, expected {} for group {}",
                self.next,
                self.solver.id()
            );
        }
        if let Some(workspace) = &self.workspace {
            workspace.write_entry(index, position, velocity);
        }
        self.next = index + 1;
        if self.next == self.capacity {
            // Let go of frame scratch before the last publish so that it
            // is never the last holder when the frame settles.
            self.workspace = None;
        }
        self.solver.publish(index);
    }

    /// Entries submitted so far.
    pub fn submitted(&self) -> usize {
        self.next
    }

    /// Entries expected.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether every entry has been submitted.
    pub fn is_complete(&self) -> bool {
        self.next == self.capacity
    }
}

impl Drop for AsyncContext {
    fn drop(&mut self) {
        if !self.is_complete() && !std::thread::panicking() {
            tracing::error!(
                group = %self.solver.id(),
                submitted = self.next,
                capacity = self.capacity,
                "async context dropped before streaming finished"
            );
            panic!(
                "async context for group {} dropped after {} of {} entries",
                self.solver.id(),
                self.next,
                self.capacity
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_arena::{ArenaConfig, FrameArena};
    use flux_core::GroupId;

    fn context(n: usize) -> (AsyncContext, Arc<LocalSolver>, Arc<FrameArena>) {
        let arena = FrameArena::new(&ArenaConfig::new(256)).unwrap();
        let ws = Arc::new(Workspace::new(&arena, n));
        let solver = Arc::new(LocalSolver::new(GroupId::next()));
        solver.begin(Arc::clone(&ws));
        (AsyncContext::new(Arc::clone(&solver), ws), solver, arena)
    }

    #[test]
    fn streaming_advances_revision() {
        let (mut ctx, solver, _arena) = context(3);
        for i in 0..3 {
            assert_eq!(solver.revision(), i);
            ctx.submit_query(i, Vec3::splat(i as f32), Vec3::ZERO);
        }
        assert!(ctx.is_complete());
        assert_eq!(solver.revision(), 3);
        let ws = solver.workspace().unwrap();
        assert_eq!(ws.position(2), Vec3::splat(2.0));
    }

    #[test]
    fn completed_context_lets_go_of_scratch() {
        let (mut ctx, solver, arena) = context(1);
        ctx.submit_query(0, Vec3::ONE, Vec3::ZERO);
        solver.release();
        assert!(arena.reset().is_ok());
        drop(ctx);
    }

    #[test]
    fn empty_context_is_complete() {
        let (ctx, _solver, _arena) = context(0);
        assert!(ctx.is_complete());
    }

    #[test]
    #[should_panic(expected = "beyond capacity")]
    fn submit_past_capacity_is_fatal() {
        let (mut ctx, _solver, _arena) = context(1);
        ctx.submit_query(0, Vec3::ZERO, Vec3::ZERO);
        ctx.submit_query(1, Vec3::ZERO, Vec3::ZERO);
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn submit_out_of_order_is_fatal() {
        let (mut ctx, _solver, _arena) = context(3);
        ctx.submit_query(1, Vec3::ZERO, Vec3::ZERO);
    }

    #[test]
    #[should_panic(expected = "dropped after 1 of 2")]
    fn dropping_incomplete_context_is_fatal() {
        let (mut ctx, _solver, _arena) = context(2);
        ctx.submit_query(0, Vec3::ZERO, Vec3::ZERO);
        drop(ctx);
    }
}
