//! Streaming constraint application.
//!
//! A [`ConstraintRunner`] follows the same revision counter as the sort
//! job. Whenever the caller has published more entries, it copies the
//! newly revealed run from the workspace into the caller's particle
//! state and satisfies the constraint over that run, so constraint work
//! overlaps with the caller's integration loop instead of trailing it.

use std::sync::Arc;

use flux_core::{Constraint, ConstraintError, Vec3};
use parking_lot::Mutex;

use crate::buffer::ParticleState;
use crate::local::LocalSolver;
use crate::workspace::Workspace;

/// Applies one [`Constraint`] to a group as its entries stream in.
#[derive(Debug)]
pub struct ConstraintRunner {
    constraint: Constraint,
    state: Arc<Mutex<ParticleState>>,
    solver: Arc<LocalSolver>,
    workspace: Arc<Workspace>,
}

impl ConstraintRunner {
    /// Runner writing into `state` for the frame `solver` is streaming
    /// into `workspace`.
    pub fn new(
        constraint: Constraint,
        state: Arc<Mutex<ParticleState>>,
        solver: Arc<LocalSolver>,
        workspace: Arc<Workspace>,
    ) -> Self {
        Self {
            constraint,
            state,
            solver,
            workspace,
        }
    }

    /// Process every entry of the frame, chunk by chunk as revealed.
    ///
    /// Returns the number of entities the constraint corrected. On error
    /// the remaining entries are left untouched.
    pub fn run(self) -> Result<u32, ConstraintError> {
        let count = self.workspace.capacity();
        self.solver.set_constraint_running(true);
        let result = self.run_chunks(count);
        self.solver.set_constraint_running(false);
        result
    }

    fn run_chunks(&self, count: usize) -> Result<u32, ConstraintError> {
        let mut done = 0;
        let mut corrected = 0;
        while done < count {
            let revealed = self.solver.await_revision(done).min(count);
            let mut state = self.state.lock();
            let ParticleState {
                positions,
                velocities,
            } = &mut *state;
            if positions.len() < revealed {
                positions.resize(revealed, Vec3::ZERO);
                velocities.resize(revealed, Vec3::ZERO);
            }
            for i in done..revealed {
                positions[i] = self.workspace.position(i);
                velocities[i] = self.workspace.velocity(i);
            }
            corrected += self
                .constraint
                .satisfy(&mut positions[done..revealed], &mut velocities[done..revealed])?;
            done = revealed;
        }
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_arena::{ArenaConfig, FrameArena};
    use flux_core::{ConstraintKind, GroupId};

    fn setup(n: usize) -> (Arc<LocalSolver>, Arc<Workspace>, Arc<Mutex<ParticleState>>) {
        let arena = FrameArena::new(&ArenaConfig::new(1024)).unwrap();
        let ws = Arc::new(Workspace::new(&arena, n));
        let solver = Arc::new(LocalSolver::new(GroupId::next()));
        solver.begin(Arc::clone(&ws));
        let state = Arc::new(Mutex::new(ParticleState {
            positions: vec![Vec3::ZERO; n],
            velocities: vec![Vec3::ZERO; n],
        }));
        (solver, ws, state)
    }

    #[test]
    fn floor_applies_as_entries_stream() {
        let (solver, ws, state) = setup(16);
        let runner = ConstraintRunner::new(
            Constraint::floor(),
            Arc::clone(&state),
            Arc::clone(&solver),
            Arc::clone(&ws),
        );
        let job = std::thread::spawn(move || runner.run());
        for i in 0..16 {
            // Even entries are sinking through the floor.
            let y = if i % 2 == 0 { 0.0 } else { 5.0 };
            ws.write_entry(i, Vec3::new(i as f32, y, 0.0), Vec3::new(0.0, -1.0, 0.0));
            solver.publish(i);
        }
        assert_eq!(job.join().unwrap().unwrap(), 8);
        assert!(!solver.is_constraint_running());

        let state = state.lock();
        for i in (0..16).step_by(2) {
            assert!((state.positions[i].y - 0.2).abs() < 1e-6);
            assert!(state.velocities[i].y > 0.0);
        }
        assert_eq!(state.positions[1], Vec3::new(1.0, 5.0, 0.0));
    }

    #[test]
    fn unsupported_constraint_reports_error() {
        let (solver, ws, state) = setup(1);
        ws.write_entry(0, Vec3::ONE, Vec3::ZERO);
        solver.publish(0);
        let runner = ConstraintRunner::new(
            Constraint::Density {
                value: 1.0,
                handle_boundary: false,
            },
            state,
            Arc::clone(&solver),
            ws,
        );
        assert_eq!(
            runner.run(),
            Err(ConstraintError::Unsupported {
                kind: ConstraintKind::Density
            })
        );
        assert!(!solver.is_constraint_running());
    }
}
