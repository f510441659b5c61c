//! Worker pool and job batching for the Flux collision solver.
//!
//! - [`JobScheduler`]: a fixed pool of named worker threads fed by a
//!   bounded multi-producer queue. A full queue blocks the producer;
//!   producers that are themselves workers run the job inline instead,
//!   so jobs may freely queue follow-up jobs.
//! - [`JobGroup`]: a syncable batch of jobs issued by one subsystem per
//!   frame, with tail jobs deferred behind the bulk of the batch.
//! - [`Semaphore`], [`Event`], [`StripedLock`]: the blocking primitives
//!   the solver's frame barrier and result accumulation are built on.
//!
//! A job that panics aborts the process. Jobs in this workspace only
//! panic on broken invariants, and there is no partial-frame recovery.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod group;
pub mod job;
pub mod metrics;
pub mod scheduler;
pub mod sync;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use group::JobGroup;
pub use job::{JobHandle, JobId};
pub use metrics::SchedulerMetrics;
pub use scheduler::{JobScheduler, ShutdownReport};
pub use sync::{Event, Pending, Semaphore, StripedLock};
