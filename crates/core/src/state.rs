// SPDX-License-Identifier: MIT

//! File lifecycle states and events.
//!
//! The durable store owns the state; these types define the closed enum the
//! store's CHECK constraint enforces and the legal-edge table every
//! transition is validated against.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a corpus file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// Discovered by the scanner, not yet sent anywhere
    Untracked,
    /// Upload submitted, remote operation in flight
    Uploading,
    /// Upload accepted, remote indexing in progress
    Processing,
    /// Remote indexing finished; file is queryable
    Indexed,
    /// Permanently failed; requires administrative recovery
    Failed,
}

crate::simple_display! {
    FileState {
        Untracked => "untracked",
        Uploading => "uploading",
        Processing => "processing",
        Indexed => "indexed",
        Failed => "failed",
    }
}

impl FileState {
    pub const ALL: [FileState; 5] = [
        FileState::Untracked,
        FileState::Uploading,
        FileState::Processing,
        FileState::Indexed,
        FileState::Failed,
    ];

    /// States the worker pool claims work from.
    pub const ELIGIBLE: [FileState; 3] =
        [FileState::Untracked, FileState::Uploading, FileState::Processing];

    /// Terminal states have no automated exits.
    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Indexed | FileState::Failed)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|state| state.to_string() == s)
    }
}

/// Events that drive a file through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestEvent {
    StartUpload,
    UploadComplete,
    ProcessingComplete,
    FailUpload,
    FailProcessing,
}

crate::simple_display! {
    IngestEvent {
        StartUpload => "start_upload",
        UploadComplete => "upload_complete",
        ProcessingComplete => "processing_complete",
        FailUpload => "fail_upload",
        FailProcessing => "fail_processing",
    }
}

impl IngestEvent {
    /// The single legal source state for this event.
    pub fn source(self) -> FileState {
        match self {
            IngestEvent::StartUpload => FileState::Untracked,
            IngestEvent::UploadComplete | IngestEvent::FailUpload => FileState::Uploading,
            IngestEvent::ProcessingComplete | IngestEvent::FailProcessing => FileState::Processing,
        }
    }

    /// The state this event lands in.
    pub fn target(self) -> FileState {
        match self {
            IngestEvent::StartUpload => FileState::Uploading,
            IngestEvent::UploadComplete => FileState::Processing,
            IngestEvent::ProcessingComplete => FileState::Indexed,
            IngestEvent::FailUpload | IngestEvent::FailProcessing => FileState::Failed,
        }
    }

    /// Whether this event may fire from the given state.
    pub fn allowed_from(self, state: FileState) -> bool {
        self.source() == state
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
