//! Scheduler counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Snapshot of cumulative scheduler counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerMetrics {
    /// Jobs handed to the scheduler.
    pub jobs_queued: u64,
    /// Jobs that finished running, on a worker or inline.
    pub jobs_run: u64,
    /// Jobs a worker ran inline because the queue was full.
    pub jobs_run_inline: u64,
    /// Times a producer blocked on a full queue.
    pub producer_blocks: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) jobs_queued: CachePadded<AtomicU64>,
    pub(crate) jobs_run: CachePadded<AtomicU64>,
    pub(crate) jobs_run_inline: CachePadded<AtomicU64>,
    pub(crate) producer_blocks: CachePadded<AtomicU64>,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SchedulerMetrics {
        SchedulerMetrics {
            jobs_queued: self.jobs_queued.load(Ordering::Relaxed),
            jobs_run: self.jobs_run.load(Ordering::Relaxed),
            jobs_run_inline: self.jobs_run_inline.load(Ordering::Relaxed),
            producer_blocks: self.producer_blocks.load(Ordering::Relaxed),
        }
    }
}
