//! Tunables reload hook.
//!
//! The solver polls its [`TunablesSource`] once per `begin_batch`. A
//! source returns `Ok(None)` when nothing changed, new tunables when a
//! reload is due, or an error, in which case the solver logs a warning
//! and keeps the tunables it already has.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flux_core::CollisionTunables;

use crate::error::ReloadError;

/// A provider of replacement tunables, polled between frames.
pub trait TunablesSource: Send {
    /// Return new tunables if a reload is due.
    fn poll(&mut self) -> Result<Option<CollisionTunables>, ReloadError>;
}

// ── FixedTunables ──────────────────────────────────────────────────

/// Delivers one set of tunables on the next poll, then nothing.
#[derive(Clone, Debug, Default)]
pub struct FixedTunables {
    pending: Option<CollisionTunables>,
}

impl FixedTunables {
    /// Source that will deliver `tunables` on its first poll.
    pub fn new(tunables: CollisionTunables) -> Self {
        Self {
            pending: Some(tunables),
        }
    }
}

impl TunablesSource for FixedTunables {
    fn poll(&mut self) -> Result<Option<CollisionTunables>, ReloadError> {
        Ok(self.pending.take())
    }
}

// ── JsonTunablesFile ───────────────────────────────────────────────

/// Cloneable trigger for a [`JsonTunablesFile`] reload, e.g. bound to a
/// key press on the input thread.
#[derive(Clone, Debug, Default)]
pub struct ReloadHandle {
    requested: Arc<AtomicBool>,
}

impl ReloadHandle {
    /// Ask for the file to be re-read at the next poll.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Whether a reload is pending.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

/// Reads [`CollisionTunables`] from a JSON file on request.
///
/// Missing fields fall back to their defaults, so a file may override
/// just the parameters it cares about.
#[derive(Debug)]
pub struct JsonTunablesFile {
    path: PathBuf,
    handle: ReloadHandle,
}

impl JsonTunablesFile {
    /// Source reading `path`. No reload is pending initially.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: ReloadHandle::default(),
        }
    }

    /// Source reading `path` that loads it on the first poll.
    pub fn load_on_start(path: impl Into<PathBuf>) -> Self {
        let source = Self::new(path);
        source.request_reload();
        source
    }

    /// Re-read the file at the next poll.
    pub fn request_reload(&self) {
        self.handle.request();
    }

    /// A trigger usable from other threads after the source has been
    /// handed to the solver.
    pub fn reload_handle(&self) -> ReloadHandle {
        self.handle.clone()
    }

    /// The file this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the file now.
    pub fn read(&self) -> Result<CollisionTunables, ReloadError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ReloadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let tunables: CollisionTunables =
            serde_json::from_str(&text).map_err(|source| ReloadError::Parse {
                path: self.path.clone(),
                source,
            })?;
        tunables.validate()?;
        Ok(tunables)
    }
}

impl TunablesSource for JsonTunablesFile {
    fn poll(&mut self) -> Result<Option<CollisionTunables>, ReloadError> {
        if !self.handle.take() {
            return Ok(None);
        }
        self.read().map(Some)
    }
}
