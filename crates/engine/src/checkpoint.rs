// SPDX-License-Identifier: MIT

//! Resumable checkpoint marker.
//!
//! Written when the pool pauses on credit exhaustion. The marker records
//! where the run stopped so the operator sees what resuming will do; the
//! state store itself is the queue, so resume is just "run again".

use crate::error::EngineError;
use carrel_store::IngestCounts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMarker {
    pub written_at: String,
    pub reason: String,
    pub indexed: usize,
    pub failed: usize,
    pub remaining: usize,
}

impl CheckpointMarker {
    pub fn from_counts(reason: &str, counts: &IngestCounts, written_at: String) -> Self {
        Self {
            written_at,
            reason: reason.to_string(),
            indexed: counts.indexed,
            failed: counts.failed,
            remaining: counts.untracked + counts.uploading + counts.processing,
        }
    }

    /// Marker lives beside the database file.
    pub fn path_for(db_path: &Path) -> PathBuf {
        let mut name = db_path.as_os_str().to_os_string();
        name.push(".checkpoint.json");
        PathBuf::from(name)
    }

    pub fn write(&self, path: &Path) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Checkpoint(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| EngineError::Checkpoint(e.to_string()))?;
        tracing::warn!(path = %path.display(), reason = %self.reason, "checkpoint written");
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Option<Self>, EngineError> {
        if !path.exists() {
            return Ok(None);
        }
        let json =
            std::fs::read_to_string(path).map_err(|e| EngineError::Checkpoint(e.to_string()))?;
        let marker =
            serde_json::from_str(&json).map_err(|e| EngineError::Checkpoint(e.to_string()))?;
        Ok(Some(marker))
    }

    pub fn clear(path: &Path) -> Result<(), EngineError> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| EngineError::Checkpoint(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
