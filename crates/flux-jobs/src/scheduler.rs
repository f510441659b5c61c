//! The worker pool.
//!
//! Workers pull [`Job`]s from a bounded crossbeam channel. Producers on
//! ordinary threads block when the channel is full; producers that are
//! workers of the same pool run the job inline, so a job that queues
//! follow-up jobs can never deadlock the pool.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::job::{Job, JobHandle, JobId};
use crate::metrics::{Counters, SchedulerMetrics};
use crate::sync::Event;

thread_local! {
    /// Pool id of the scheduler owning the current thread, 0 if none.
    static WORKER_OF: Cell<u64> = const { Cell::new(0) };
}

// ── ShutdownReport ───────────────────────────────────────────────

/// Report from [`JobScheduler::shutdown`].
#[derive(Debug)]
pub struct ShutdownReport {
    /// Total time spent draining and joining.
    pub total_ms: u64,
    /// Number of worker threads joined.
    pub workers_joined: usize,
    /// Counters at the moment the last worker exited.
    pub metrics: SchedulerMetrics,
}

// ── JobScheduler ─────────────────────────────────────────────────

/// Fixed-size pool of worker threads.
///
/// Shared as `Arc<JobScheduler>`. Every queued job runs exactly once.
/// Dropping the scheduler drains the queue and joins the workers.
pub struct JobScheduler {
    pool_id: u64,
    sender: RwLock<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    worker_count: usize,
    queue_capacity: usize,
}

impl JobScheduler {
    /// Spawn the worker threads described by `config`.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        static NEXT_POOL: AtomicU64 = AtomicU64::new(1);
        let pool_id = NEXT_POOL.fetch_add(1, Ordering::Relaxed);

        let worker_count = config.resolved_worker_count();
        let queue_capacity = config.queue_capacity();
        let (tx, rx) = crossbeam_channel::bounded::<Job>(queue_capacity);
        let counters = Arc::new(Counters::default());

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let rx = rx.clone();
            let counters = Arc::clone(&counters);
            let handle = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || worker_loop(pool_id, rx, counters))
                .map_err(|source| SchedulerError::ThreadSpawnFailed { index, source })?;
            workers.push(handle);
        }
        tracing::debug!(worker_count, queue_capacity, "job scheduler started");

        Ok(Self {
            pool_id,
            sender: RwLock::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
            worker_count,
            queue_capacity,
        })
    }

    /// Queue `work` to run once on a worker.
    pub fn queue_job<F>(&self, work: F, name: &'static str) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue_job_with(work, |()| {}, name)
    }

    /// Queue `work`, then run `on_complete` with its return value on the
    /// same (unspecified) thread.
    ///
    /// The returned handle completes after `on_complete` has returned.
    pub fn queue_job_with<F, R, C>(&self, work: F, on_complete: C, name: &'static str) -> JobHandle
    where
        F: FnOnce() -> R + Send + 'static,
        C: FnOnce(R) + Send + 'static,
    {
        let id = JobId::next();
        let done = Arc::new(Event::new(false));
        let signal = Arc::clone(&done);
        self.dispatch(Job {
            id,
            name,
            work: Box::new(move || {
                on_complete(work());
                signal.set();
            }),
        });
        JobHandle::new(id, name, done)
    }

    fn dispatch(&self, job: Job) {
        let Some(tx) = self.sender.read().clone() else {
            tracing::error!(job = job.name, "job queued after scheduler shutdown");
            panic!("job `{}` queued after scheduler shutdown", job.name);
        };
        Counters::bump(&self.counters.jobs_queued);
        match tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) if self.is_worker_thread() => {
                Counters::bump(&self.counters.jobs_run_inline);
                run_job(job, &self.counters);
            }
            Err(TrySendError::Full(job)) => {
                Counters::bump(&self.counters.producer_blocks);
                if let Err(e) = tx.send(job) {
                    disconnected(e.into_inner().name);
                }
            }
            Err(TrySendError::Disconnected(job)) => disconnected(job.name),
        }
    }

    /// Whether the calling thread is one of this pool's workers.
    pub fn is_worker_thread(&self) -> bool {
        WORKER_OF.with(|w| w.get()) == self.pool_id
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Queue slots before producers block.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Current counters.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.counters.snapshot()
    }

    /// Stop accepting jobs, let the workers drain the queue, and join them.
    ///
    /// Idempotent. Called from a worker of this pool it only closes the
    /// queue, since a worker cannot join itself.
    pub fn shutdown(&self) -> ShutdownReport {
        let start = Instant::now();
        self.sender.write().take();

        let mut workers_joined = 0;
        if !self.is_worker_thread() {
            for handle in self.workers.lock().drain(..) {
                if handle.join().is_ok() {
                    workers_joined += 1;
                }
            }
        }
        let report = ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            workers_joined,
            metrics: self.counters.snapshot(),
        };
        tracing::debug!(?report, "job scheduler shut down");
        report
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        if self.sender.read().is_some() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .field("metrics", &self.counters.snapshot())
            .finish()
    }
}

fn disconnected(name: &'static str) -> ! {
    tracing::error!(job = name, "job queue disconnected; no workers left");
    panic!("job `{name}` queued with no live workers");
}

fn worker_loop(pool_id: u64, rx: Receiver<Job>, counters: Arc<Counters>) {
    WORKER_OF.with(|w| w.set(pool_id));
    while let Ok(job) = rx.recv() {
        run_job(job, &counters);
    }
    // Channel closed and drained; worker exits cleanly.
}

fn run_job(job: Job, counters: &Counters) {
    let Job { id, name, work } = job;
    let span = tracing::trace_span!("job", name, id = id.0);
    let _enter = span.enter();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
        tracing::error!(
            job = name,
            panic = panic_message(payload.as_ref()),
            "job panicked; aborting"
        );
        std::process::abort();
    }
    Counters::bump(&counters.jobs_run);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

// Compile-time assertion: JobScheduler is shared across threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<JobScheduler>();
};
