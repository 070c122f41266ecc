// SPDX-License-Identifier: MIT

//! Active-session marker.
//!
//! A session is "active" for event emission when either the environment
//! variable or the marker file names it. The environment wins, so a shell
//! can pin a session without touching the shared marker.

use std::path::{Path, PathBuf};

pub struct ActiveSession {
    marker: PathBuf,
}

impl ActiveSession {
    /// Environment override, read before the marker file.
    pub const ENV: &'static str = "CARREL_SESSION";

    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            marker: data_dir.as_ref().join("session"),
        }
    }

    /// The active session id, if any.
    pub fn current(&self) -> Option<String> {
        if let Ok(id) = std::env::var(Self::ENV) {
            let id = id.trim().to_string();
            if !id.is_empty() {
                return Some(id);
            }
        }
        std::fs::read_to_string(&self.marker)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Point the marker file at a session.
    pub fn set(&self, session_id: &str) -> std::io::Result<()> {
        if let Some(parent) = self.marker.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.marker, session_id)
    }

    /// Remove the marker file (the environment override is untouched).
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.marker) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
