//! Frame completion tracking and the per-frame report.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use flux_core::FrameId;
use flux_jobs::Semaphore;

/// What happened in one settled frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// The frame this report covers.
    pub frame: FrameId,
    /// Groups registered as queries.
    pub queries: usize,
    /// Jobs issued and awaited.
    pub jobs: usize,
    /// Cross-group pair jobs among `jobs`.
    pub inter_query_jobs: u64,
    /// Same-group contacts resolved.
    pub local_collisions: u64,
    /// Cross-group contacts resolved.
    pub global_collisions: u64,
    /// Entities corrected by constraints.
    pub constraint_contacts: u64,
}

impl FrameReport {
    /// Local plus cross-group collisions.
    pub fn total_collisions(&self) -> u64 {
        self.local_collisions + self.global_collisions
    }
}

/// Counts jobs issued in a frame and blocks until they have all finished.
///
/// `issue` must happen before the job can complete, either on the thread
/// that opens the frame or inside a job of the same frame, so that the
/// waiter can never observe a completed count for a job it has not yet
/// seen issued.
#[derive(Debug, Default)]
pub(crate) struct FrameTracker {
    issued: AtomicUsize,
    completions: Semaphore,
    inter_query_jobs: AtomicU64,
    local_collisions: AtomicU64,
    global_collisions: AtomicU64,
    constraint_contacts: AtomicU64,
}

impl FrameTracker {
    pub(crate) fn issue(&self) {
        self.issued.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn complete(&self) {
        self.completions.release(1);
    }

    pub(crate) fn issued(&self) -> usize {
        self.issued.load(Ordering::Acquire)
    }

    pub(crate) fn add_inter_query_job(&self) {
        self.inter_query_jobs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_local(&self, n: u32) {
        self.local_collisions.fetch_add(u64::from(n), Ordering::Relaxed);
    }

    pub(crate) fn add_global(&self, n: u32) {
        self.global_collisions.fetch_add(u64::from(n), Ordering::Relaxed);
    }

    pub(crate) fn add_constraint(&self, n: u32) {
        self.constraint_contacts.fetch_add(u64::from(n), Ordering::Relaxed);
    }

    /// Block until every issued job, including jobs issued by jobs while
    /// waiting, has completed. Resets the issue count and returns it.
    pub(crate) fn await_all(&self) -> usize {
        let mut consumed = 0;
        loop {
            let issued = self.issued();
            if consumed == issued {
                break;
            }
            while consumed < issued {
                self.completions.acquire();
                consumed += 1;
            }
        }
        self.issued.store(0, Ordering::Release);
        consumed
    }

    /// Fill a report with this frame's counters and zero them.
    pub(crate) fn take_report(&self, frame: FrameId, queries: usize, jobs: usize) -> FrameReport {
        FrameReport {
            frame,
            queries,
            jobs,
            inter_query_jobs: self.inter_query_jobs.swap(0, Ordering::Relaxed),
            local_collisions: self.local_collisions.swap(0, Ordering::Relaxed),
            global_collisions: self.global_collisions.swap(0, Ordering::Relaxed),
            constraint_contacts: self.constraint_contacts.swap(0, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn await_all_with_nothing_issued_returns() {
        assert_eq!(FrameTracker::default().await_all(), 0);
    }

    #[test]
    fn await_all_sees_jobs_issued_by_jobs() {
        let tracker = Arc::new(FrameTracker::default());
        tracker.issue();
        let t = Arc::clone(&tracker);
        let parent = thread::spawn(move || {
            // The child is issued before the parent completes.
            t.issue();
            let child = {
                let t = Arc::clone(&t);
                thread::spawn(move || t.complete())
            };
            t.complete();
            child.join().unwrap();
        });
        assert_eq!(tracker.await_all(), 2);
        parent.join().unwrap();
        assert_eq!(tracker.issued(), 0);
    }

    #[test]
    fn report_drains_counters() {
        let tracker = FrameTracker::default();
        tracker.add_local(2);
        tracker.add_global(3);
        tracker.add_constraint(1);
        tracker.add_inter_query_job();
        let r = tracker.take_report(FrameId(4), 2, 5);
        assert_eq!(r.total_collisions(), 5);
        assert_eq!(r.inter_query_jobs, 1);
        assert_eq!(r.frame, FrameId(4));
        assert_eq!(tracker.take_report(FrameId(5), 0, 0).total_collisions(), 0);
    }
}
