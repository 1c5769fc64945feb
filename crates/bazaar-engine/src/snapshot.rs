//! JSON state snapshots.
//!
//! The engine keeps every document in memory. A snapshot is the full
//! [`MarketState`] written to one JSON file; writes go to a temporary sibling
//! first and are renamed into place, so a crash never leaves a torn file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::store::MarketState;

/// A snapshot file on disk.
#[derive(Debug, Clone)]
pub struct JsonSnapshot {
    path: PathBuf,
}

impl JsonSnapshot {
    /// Points at `path`; nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Snapshot`] if the file is missing or malformed.
    pub fn load(&self) -> Result<MarketState> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            EngineError::Snapshot(format!("failed to read '{}': {e}", self.path.display()))
        })?;
        let state: MarketState = serde_json::from_str(&content).map_err(|e| {
            EngineError::Snapshot(format!("malformed snapshot '{}': {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), accounts = state.accounts.len(), "snapshot loaded");
        Ok(state)
    }

    /// Reads the snapshot, or returns empty state if none was written yet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Snapshot`] if the file exists but is malformed.
    pub fn load_or_default(&self) -> Result<MarketState> {
        if self.path.exists() {
            self.load()
        } else {
            info!(path = %self.path.display(), "no snapshot yet, starting empty");
            Ok(MarketState::default())
        }
    }

    /// Writes `state`, replacing any previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Snapshot`] if the directory or file cannot be
    /// written.
    pub fn save(&self, state: &MarketState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    EngineError::Snapshot(format!(
                        "failed to create '{}': {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| {
            EngineError::Snapshot(format!("failed to write '{}': {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            EngineError::Snapshot(format!(
                "failed to move snapshot into '{}': {e}",
                self.path.display()
            ))
        })?;

        info!(
            path = %self.path.display(),
            accounts = state.accounts.len(),
            projects = state.projects.len(),
            orders = state.orders.len(),
            "snapshot saved"
        );
        Ok(())
    }
}
