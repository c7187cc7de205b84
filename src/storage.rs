//! Durable persistence for the logger's error buffer.
//!
//! The backend is constructor-injected into [`crate::ErrorLogger`] so tests
//! can observe and fail persistence deterministically. The on-disk format is
//! a JSON array of [`LoggedError`] records; the original error objects are
//! never stored.

use crate::error::AppResult;
use crate::logger::LoggedError;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Persistence backend for the logged-error ring buffer.
///
/// `save` overwrites the whole buffer on every capture; the store never
/// appends. Implementations must tolerate concurrent processes reading the
/// file, but only one process writes it.
#[cfg_attr(test, mockall::automock)]
pub trait LogStore: Send + Sync {
    /// Load the persisted buffer, oldest first. An absent store is an empty
    /// buffer, not an error.
    fn load(&self) -> AppResult<Vec<LoggedError>>;

    /// Replace the persisted buffer with `errors`.
    fn save(&self, errors: &[LoggedError]) -> AppResult<()>;

    /// Remove the persisted buffer entirely.
    fn clear(&self) -> AppResult<()>;
}

/// File-backed store writing a JSON array under a fixed path.
#[derive(Debug, Clone)]
pub struct FileLogStore {
    path: PathBuf,
}

impl FileLogStore {
    /// Create a store persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this store persists to.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl LogStore for FileLogStore {
    fn load(&self) -> AppResult<Vec<LoggedError>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let errors = serde_json::from_str(&raw)?;
        Ok(errors)
    }

    fn save(&self, errors: &[LoggedError]) -> AppResult<()> {
        let payload = serde_json::to_string(errors)?;
        // Write-then-rename so a crash mid-write can't corrupt the buffer.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: Mutex<Vec<LoggedError>>,
}

impl MemoryLogStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryLogStore {
    fn load(&self) -> AppResult<Vec<LoggedError>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, errors: &[LoggedError]) -> AppResult<()> {
        *self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = errors.to_vec();
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        Ok(())
    }
}
