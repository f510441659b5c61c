//! Where the solver's jobs go.

use std::sync::Arc;

use flux_jobs::{JobGroup, JobScheduler};

/// Target for the solver's jobs in one frame.
///
/// Either the shared pool directly, or a caller-supplied [`JobGroup`]
/// the caller can sync on and whose tail slots hold back the
/// cross-group work.
#[derive(Clone, Debug)]
pub enum Dispatch {
    /// Queue straight onto the pool.
    Scheduler(Arc<JobScheduler>),
    /// Queue through a job group.
    Group(Arc<JobGroup>),
}

impl Dispatch {
    /// Queue `work`. With an `end_margin` and a group target the job is
    /// queued as a tail job; otherwise it is dispatched at once.
    pub fn queue<F>(&self, work: F, name: &'static str, end_margin: Option<usize>)
    where
        F: FnOnce() + Send + 'static,
    {
        match (self, end_margin) {
            (Self::Scheduler(scheduler), _) => {
                scheduler.queue_job(work, name);
            }
            (Self::Group(group), Some(margin)) => group.queue_at_end(work, name, margin),
            (Self::Group(group), None) => group.add(work, name),
        }
    }
}
