//! Arena configuration parameters.

use crate::error::ArenaError;

/// Configuration for the frame arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Capacity in 32-bit words.
    ///
    /// Default: 2_621_440 (10MB at 4 bytes per word). Every group in a
    /// frame takes `8 * live_count` words, so the default fits roughly
    /// 327k streamed particles per frame.
    pub capacity_words: usize,
}

impl ArenaConfig {
    /// Default capacity: 10MB / 4 bytes.
    pub const DEFAULT_CAPACITY_WORDS: usize = 10 * 1024 * 1024 / 4;

    /// Config with an explicit capacity in words.
    pub fn new(capacity_words: usize) -> Self {
        Self { capacity_words }
    }

    /// Capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_words * std::mem::size_of::<u32>()
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.capacity_words == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "capacity_words must be non-zero",
            });
        }
        if u32::try_from(self.capacity_words).is_err() {
            return Err(ArenaError::InvalidConfig {
                reason: "capacity_words must fit in a u32 offset",
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY_WORDS)
    }
}
