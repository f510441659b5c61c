//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`GroupId`] allocation.
static GROUP_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Stable identity token of a particle group.
///
/// The solver keys its per-group scratch workspaces by this token, so a
/// group must present the same `GroupId` every frame. Ids are either
/// allocated from a process-wide counter via [`GroupId::next`] or supplied
/// by the caller from its own stable numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

impl GroupId {
    /// Allocate a fresh, unique id.
    ///
    /// Each call returns an id that has never been returned before within
    /// this process. Thread-safe.
    pub fn next() -> Self {
        Self(GROUP_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GroupId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Monotonically increasing frame counter.
///
/// Advanced by each `begin_batch`. Frame 0 is the state before the first
/// batch has been opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl FrameId {
    /// The frame that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_ids_are_unique() {
        let a = GroupId::next();
        let b = GroupId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn frame_id_advances() {
        assert_eq!(FrameId::default().next(), FrameId(1));
        assert_eq!(FrameId(41).next().to_string(), "42");
    }
}
