//! Blocking synchronization primitives.
//!
//! These complement the spin-then-yield handoff used for streaming. A
//! [`Semaphore`], an [`Event`] and a [`Pending`] counter park the waiting
//! thread; a [`StripedLock`] spreads contention for per-entity
//! accumulation across cache-padded mutexes.

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex, MutexGuard};

// ── Semaphore ──────────────────────────────────────────────────────

/// Counting semaphore.
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    cv: Condvar,
}

impl Semaphore {
    /// Semaphore holding `initial` permits.
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cv: Condvar::new(),
        }
    }

    /// Block until a permit is available and take it.
    pub fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cv.wait(&mut count);
        }
        *count -= 1;
    }

    /// Take a permit if one is available.
    pub fn try_acquire(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Return `n` permits.
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        *self.count.lock() += n;
        if n == 1 {
            self.cv.notify_one();
        } else {
            self.cv.notify_all();
        }
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        *self.count.lock()
    }
}

// ── Event ──────────────────────────────────────────────────────────

/// Manual-reset event.
///
/// Stays signaled until [`reset`](Event::reset) is called; every waiter
/// is released while it is set.
#[derive(Debug, Default)]
pub struct Event {
    set: Mutex<bool>,
    cv: Condvar,
}

impl Event {
    /// Event in the given initial state.
    pub fn new(signaled: bool) -> Self {
        Self {
            set: Mutex::new(signaled),
            cv: Condvar::new(),
        }
    }

    /// Signal the event, releasing all waiters.
    pub fn set(&self) {
        *self.set.lock() = true;
        self.cv.notify_all();
    }

    /// Clear the event.
    pub fn reset(&self) {
        *self.set.lock() = false;
    }

    /// Whether the event is signaled.
    pub fn is_set(&self) -> bool {
        *self.set.lock()
    }

    /// Block until the event is signaled.
    pub fn wait(&self) {
        let mut set = self.set.lock();
        while !*set {
            self.cv.wait(&mut set);
        }
    }
}

// ── Pending ────────────────────────────────────────────────────────

/// Count of outstanding work that waiters can block on until it drains.
///
/// Unlike a [`Semaphore`] the count may rise again after reaching zero;
/// [`wait_drained`](Pending::wait_drained) returns as soon as it observes
/// zero.
#[derive(Debug, Default)]
pub struct Pending {
    count: Mutex<usize>,
    cv: Condvar,
}

impl Pending {
    /// Record one more outstanding item.
    pub fn add(&self) {
        *self.count.lock() += 1;
    }

    /// Mark one item finished. Returns the count still outstanding.
    ///
    /// # Panics
    ///
    /// Panics if nothing is outstanding.
    pub fn done(&self) -> usize {
        let mut count = self.count.lock();
        assert!(*count > 0, "Pending::done with nothing outstanding");
        *count -= 1;
        if *count == 0 {
            self.cv.notify_all();
        }
        *count
    }

    /// Items outstanding.
    pub fn outstanding(&self) -> usize {
        *self.count.lock()
    }

    /// Block until nothing is outstanding.
    pub fn wait_drained(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.cv.wait(&mut count);
        }
    }
}

// ── StripedLock ────────────────────────────────────────────────────

/// A fixed set of cache-padded mutexes selected by key.
///
/// Keys that map to different stripes never contend. Used to serialize
/// read-modify-write on individual result cells without one global lock.
#[derive(Debug)]
pub struct StripedLock {
    stripes: Box<[CachePadded<Mutex<()>>]>,
}

impl StripedLock {
    /// Lock with `stripes` stripes (at least one).
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1))
            .map(|_| CachePadded::new(Mutex::new(())))
            .collect();
        Self { stripes }
    }

    /// Lock the stripe that owns `key`.
    #[inline]
    pub fn lock(&self, key: usize) -> MutexGuard<'_, ()> {
        self.stripes[key % self.stripes.len()].lock()
    }

    /// Number of stripes.
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }
}
