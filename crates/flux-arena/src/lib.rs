//! Frame-scoped scratch allocation for the Flux collision solver.
//!
//! One [`FrameArena`] backs every piece of per-frame scratch the solver
//! needs: streamed positions and velocities, and the sorted broad-phase
//! index of each participating group. Allocation is a bump of a cursor;
//! nothing is freed individually. At the end of the frame the arena is
//! reset wholesale and its generation advances.
//!
//! # Architecture
//!
//! ```text
//! Arc<FrameArena>
//! ├── Box<[AtomicU32]>        (fixed word storage, allocated once)
//! ├── Mutex<BumpState>        (cursor + generation)
//! └── outstanding lease count
//!
//! FrameLease (RAII, one per allocation)
//! ├── Arc<FrameArena>
//! └── SliceHandle { generation, offset, len }
//! ```
//!
//! Words are atomics so that a producer thread and a consumer job can
//! share a lane without `unsafe`: the producer stores with relaxed
//! ordering and publishes through an external release counter.
//!
//! # Policy
//!
//! The arena never grows and never wraps. Exhausting it is a fatal
//! configuration error, and resetting it while leases are still alive is
//! refused with [`ArenaError::LeasesOutstanding`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod frame;
pub mod handle;

pub use config::ArenaConfig;
pub use error::ArenaError;
pub use frame::{FrameArena, FrameLease};
pub use handle::SliceHandle;
