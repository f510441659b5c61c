//! Syncable batches of jobs.
//!
//! A [`JobGroup`] tracks every job one subsystem issues in a frame.
//! Bulk jobs ([`add`](JobGroup::add)) dispatch immediately. Tail jobs
//! ([`queue_at_end`](JobGroup::queue_at_end)) are held back until at most
//! `margin` bulk jobs are still outstanding, so they land behind the
//! bulk of the batch instead of competing with it. [`sync`](JobGroup::sync)
//! releases any held tail jobs and blocks until the group drains.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::scheduler::JobScheduler;

type Work = Box<dyn FnOnce() + Send + 'static>;

struct Deferred {
    work: Work,
    name: &'static str,
    margin: usize,
}

#[derive(Default)]
struct Counts {
    issued: usize,
    completed: usize,
    bulk_outstanding: usize,
    deferred: VecDeque<Deferred>,
}

impl Counts {
    /// Pop the deferred jobs whose margin is now satisfied, in order.
    fn take_ready(&mut self, release_all: bool) -> Vec<Deferred> {
        let mut ready = Vec::new();
        let mut kept = VecDeque::with_capacity(self.deferred.len());
        for d in self.deferred.drain(..) {
            if release_all || self.bulk_outstanding <= d.margin {
                ready.push(d);
            } else {
                kept.push_back(d);
            }
        }
        self.deferred = kept;
        ready
    }
}

struct Shared {
    counts: Mutex<Counts>,
    drained: Condvar,
}

/// A batch of jobs that can be waited on as a whole.
///
/// Dropping a group with outstanding jobs is a usage error and panics.
pub struct JobGroup {
    scheduler: Arc<JobScheduler>,
    shared: Arc<Shared>,
    name: &'static str,
}

impl JobGroup {
    /// Empty group dispatching onto `scheduler`.
    pub fn new(scheduler: Arc<JobScheduler>, name: &'static str) -> Self {
        Self {
            scheduler,
            shared: Arc::new(Shared {
                counts: Mutex::new(Counts::default()),
                drained: Condvar::new(),
            }),
            name,
        }
    }

    /// The scheduler this group dispatches onto.
    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    /// Diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add a bulk job and dispatch it.
    pub fn add<F>(&self, work: F, name: &'static str)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut counts = self.shared.counts.lock();
            counts.issued += 1;
            counts.bulk_outstanding += 1;
        }
        let shared = Arc::clone(&self.shared);
        let scheduler = Arc::clone(&self.scheduler);
        self.scheduler.queue_job_with(
            work,
            move |()| {
                let ready = {
                    let mut counts = shared.counts.lock();
                    counts.completed += 1;
                    counts.bulk_outstanding -= 1;
                    counts.take_ready(false)
                };
                shared.drained.notify_all();
                dispatch_tail(&scheduler, &shared, ready);
            },
            name,
        );
    }

    /// Add a tail job that waits until at most `margin` bulk jobs are
    /// outstanding.
    pub fn queue_at_end<F>(&self, work: F, name: &'static str, margin: usize)
    where
        F: FnOnce() + Send + 'static,
    {
        let ready = {
            let mut counts = self.shared.counts.lock();
            counts.issued += 1;
            counts.deferred.push_back(Deferred {
                work: Box::new(work),
                name,
                margin,
            });
            counts.take_ready(false)
        };
        dispatch_tail(&self.scheduler, &self.shared, ready);
    }

    /// Release held tail jobs and block until every issued job completes.
    pub fn sync(&self) {
        let ready = self.shared.counts.lock().take_ready(true);
        dispatch_tail(&self.scheduler, &self.shared, ready);
        let mut counts = self.shared.counts.lock();
        while counts.completed < counts.issued {
            self.shared.drained.wait(&mut counts);
        }
    }

    /// Release held tail jobs and block until at least `expected` jobs
    /// issued to this group have completed.
    pub fn sync_at_least(&self, expected: usize) {
        let ready = self.shared.counts.lock().take_ready(true);
        dispatch_tail(&self.scheduler, &self.shared, ready);
        let mut counts = self.shared.counts.lock();
        let target = expected.min(counts.issued);
        while counts.completed < target {
            self.shared.drained.wait(&mut counts);
        }
    }

    /// Jobs issued and not yet completed.
    pub fn outstanding(&self) -> usize {
        let counts = self.shared.counts.lock();
        counts.issued - counts.completed
    }

    /// Jobs issued over the group's lifetime.
    pub fn issued(&self) -> usize {
        self.shared.counts.lock().issued
    }
}

fn dispatch_tail(scheduler: &JobScheduler, shared: &Arc<Shared>, ready: Vec<Deferred>) {
    for d in ready {
        let shared = Arc::clone(shared);
        scheduler.queue_job_with(
            d.work,
            move |()| {
                shared.counts.lock().completed += 1;
                shared.drained.notify_all();
            },
            d.name,
        );
    }
}

impl Drop for JobGroup {
    fn drop(&mut self) {
        let outstanding = self.outstanding();
        if outstanding > 0 && !std::thread::panicking() {
            tracing::error!(
                group = self.name,
                outstanding,
                "job group dropped with outstanding jobs"
            );
            panic!(
                "job group `{}` dropped with {outstanding} outstanding jobs",
                self.name
            );
        }
    }
}

impl std::fmt::Debug for JobGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts = self.shared.counts.lock();
        f.debug_struct("JobGroup")
            .field("name", &self.name)
            .field("issued", &counts.issued)
            .field("completed", &counts.completed)
            .field("deferred", &counts.deferred.len())
            .finish()
    }
}
