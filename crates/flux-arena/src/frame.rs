//! The frame arena and its leases.
//!
//! [`FrameArena`] is a fixed-size bump allocator over atomic 32-bit
//! words. Each allocation returns a [`FrameLease`] that keeps the arena
//! alive and counts as outstanding until dropped. The arena can only be
//! reset once every lease has been dropped, so a lease can never observe
//! data from a later frame.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::handle::SliceHandle;

struct BumpState {
    cursor: usize,
    generation: u32,
}

/// Fixed-capacity, frame-scoped bump allocator.
///
/// Shared as `Arc<FrameArena>`; leases hold a clone of that `Arc`.
pub struct FrameArena {
    words: Box<[AtomicU32]>,
    state: Mutex<BumpState>,
    outstanding: AtomicUsize,
}

impl FrameArena {
    /// Allocate the backing storage described by `config`.
    pub fn new(config: &ArenaConfig) -> Result<Arc<Self>, ArenaError> {
        config.validate()?;
        let words = (0..config.capacity_words)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Arc::new(Self {
            words,
            state: Mutex::new(BumpState {
                cursor: 0,
                generation: 0,
            }),
            outstanding: AtomicUsize::new(0),
        }))
    }

    /// Allocate `len` zeroed words for the current generation.
    pub fn try_lease(self: &Arc<Self>, len: usize) -> Result<FrameLease, ArenaError> {
        let handle = {
            let mut state = self.state.lock();
            let capacity = self.words.len();
            let available = capacity - state.cursor;
            if len > available {
                return Err(ArenaError::CapacityExceeded {
                    requested: len,
                    available,
                    capacity,
                });
            }
            // Capacity is validated to fit in u32, so both casts are lossless.
            let handle = SliceHandle::new(state.generation, state.cursor as u32, len as u32);
            state.cursor += len;
            self.outstanding.fetch_add(1, Ordering::AcqRel);
            handle
        };
        for word in &self.words[handle.range()] {
            word.store(0, Ordering::Relaxed);
        }
        Ok(FrameLease {
            arena: Arc::clone(self),
            handle,
        })
    }

    /// Allocate `len` zeroed words, treating exhaustion as fatal.
    ///
    /// # Panics
    ///
    /// Panics if the arena cannot satisfy the request. The arena is sized
    /// once from configuration and running out of it mid-frame leaves no
    /// sane way to continue the frame.
    pub fn lease(self: &Arc<Self>, len: usize) -> FrameLease {
        match self.try_lease(len) {
            Ok(lease) => lease,
            Err(e) => {
                tracing::error!(error = %e, "frame arena exhausted");
                panic!("{e}");
            }
        }
    }

    /// Rewind the cursor and advance the generation.
    ///
    /// Returns the new generation, or [`ArenaError::LeasesOutstanding`] if
    /// any lease is still alive.
    pub fn reset(&self) -> Result<u32, ArenaError> {
        let mut state = self.state.lock();
        let count = self.outstanding.load(Ordering::Acquire);
        if count > 0 {
            return Err(ArenaError::LeasesOutstanding { count });
        }
        state.cursor = 0;
        state.generation = state.generation.wrapping_add(1);
        Ok(state.generation)
    }

    /// Resolve a handle to its words, checking that it is from the
    /// current generation.
    pub fn resolve(&self, handle: SliceHandle) -> Result<&[AtomicU32], ArenaError> {
        let current = self.state.lock().generation;
        if handle.generation != current {
            return Err(ArenaError::StaleHandle {
                handle_generation: handle.generation,
                current,
            });
        }
        Ok(&self.words[handle.range()])
    }

    /// Current generation.
    pub fn generation(&self) -> u32 {
        self.state.lock().generation
    }

    /// Words handed out in the current generation.
    pub fn used(&self) -> usize {
        self.state.lock().cursor
    }

    /// Total capacity in words.
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Number of live leases.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Memory footprint of the backing storage in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<AtomicU32>()
    }
}

impl fmt::Debug for FrameArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FrameArena")
            .field("capacity", &self.words.len())
            .field("used", &state.cursor)
            .field("generation", &state.generation)
            .field("outstanding", &self.outstanding.load(Ordering::Relaxed))
            .finish()
    }
}

/// An RAII allocation from a [`FrameArena`].
///
/// Word accessors use relaxed ordering; callers that hand a lease between
/// threads publish through their own release/acquire counter.
pub struct FrameLease {
    arena: Arc<FrameArena>,
    handle: SliceHandle,
}

impl FrameLease {
    /// Location of this lease.
    pub fn handle(&self) -> SliceHandle {
        self.handle
    }

    /// Length in words.
    pub fn len(&self) -> usize {
        self.handle.len as usize
    }

    /// Whether the lease is empty.
    pub fn is_empty(&self) -> bool {
        self.handle.len == 0
    }

    /// The leased words.
    pub fn words(&self) -> &[AtomicU32] {
        &self.arena.words[self.handle.range()]
    }

    /// Load word `i`.
    #[inline]
    pub fn load(&self, i: usize) -> u32 {
        self.words()[i].load(Ordering::Relaxed)
    }

    /// Store word `i`.
    #[inline]
    pub fn store(&self, i: usize, value: u32) {
        self.words()[i].store(value, Ordering::Relaxed);
    }

    /// Load word `i` as an `f32`.
    #[inline]
    pub fn load_f32(&self, i: usize) -> f32 {
        f32::from_bits(self.load(i))
    }

    /// Store an `f32` into word `i`.
    #[inline]
    pub fn store_f32(&self, i: usize, value: f32) {
        self.store(i, value.to_bits());
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.arena.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLease")
            .field("handle", &self.handle)
            .finish()
    }
}
