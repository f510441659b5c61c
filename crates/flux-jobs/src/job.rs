//! Job identity and completion handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::sync::Event;

/// Unique identifier for a queued job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl JobId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work owned by the scheduler until it runs.
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) name: &'static str,
    pub(crate) work: Box<dyn FnOnce() + Send + 'static>,
}

/// Handle to a queued job.
///
/// Dropping the handle does not cancel the job.
#[derive(Clone, Debug)]
pub struct JobHandle {
    id: JobId,
    name: &'static str,
    done: Arc<Event>,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, name: &'static str, done: Arc<Event>) -> Self {
        Self { id, name, done }
    }

    /// The job's identifier.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// The job's diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the job and its continuation have finished.
    pub fn is_complete(&self) -> bool {
        self.done.is_set()
    }

    /// Block until the job and its continuation have finished.
    pub fn wait(&self) {
        self.done.wait();
    }
}
