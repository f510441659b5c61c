//! Slice handles.
//!
//! A [`SliceHandle`] locates one allocation inside the frame arena. It is
//! generation-scoped: resolving a handle from an earlier generation fails
//! with [`ArenaError::StaleHandle`](crate::ArenaError::StaleHandle)
//! instead of aliasing data written in a later frame.

use std::fmt;
use std::ops::Range;

/// Location of an allocation within the frame arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct SliceHandle {
    pub(crate) generation: u32,
    pub(crate) offset: u32,
    pub(crate) len: u32,
}

impl SliceHandle {
    pub(crate) fn new(generation: u32, offset: u32, len: u32) -> Self {
        Self {
            generation,
            offset,
            len,
        }
    }

    /// The arena generation this handle belongs to.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Word offset from the start of the arena.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Length in words.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether this is a zero-length allocation.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.len as usize
    }
}

impl fmt::Display for SliceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SliceHandle(gen={}, off={}, len={})",
            self.generation, self.offset, self.len
        )
    }
}
