//! Progress persistence
//!
//! File-based storage for [`ProgressState`] with atomic writes: the state
//! is written to a temp file and renamed into place, so a crash mid-save
//! leaves either the previous state or the new one, never a torn file.

mod types;

pub use types::{ProgressState, SkippedRange};

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Loads and saves the driver's progress state
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load persisted state, or None if no prior run exists
    pub async fn load(&self) -> Result<Option<ProgressState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read progress file: {e}")))?;

        let state: ProgressState = serde_json::from_str(&contents)
            .map_err(|e| Error::state(format!("Failed to parse progress file: {e}")))?;

        Ok(Some(state))
    }

    /// Persist state atomically
    pub async fn save(&self, state: &ProgressState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::state(format!("Failed to create state dir: {e}")))?;
            }
        }

        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| Error::state(format!("Failed to serialize progress: {e}")))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write progress file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename progress file: {e}")))?;

        Ok(())
    }

    /// Delete persisted state, forcing the next run to start from scratch
    pub async fn reset(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::state(format!("Failed to remove progress file: {e}"))),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
