// SPDX-License-Identifier: MIT

//! Durable row types for files, passages, sessions, and session events.

use crate::state::FileState;
use serde::{Deserialize, Serialize};

/// One row per discovered file. Created by the scanner; mutated only by the
/// transition manager under the per-file lock and OCC; superseded, never
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path; primary key
    pub path: String,
    /// Hex sha-256 of file contents
    pub content_hash: String,
    /// Modification time, epoch ms
    pub mtime_ms: u64,
    /// Scanner-derived metadata JSON (see [`crate::meta::CorpusMeta`])
    pub meta_json: String,
    /// Enricher-derived metadata JSON, attached before upload
    pub enrichment_json: Option<String>,
    pub state: FileState,
    /// Strictly monotonic per row; every state-changing write increments it
    pub version: i64,
    /// RFC3339 timestamp of the last state change
    pub updated_at: String,
    pub last_error: Option<String>,
    /// Which pipeline stage produced `last_error`
    pub failure_stage: Option<String>,
    /// Remote file identifier, set on successful upload
    pub remote_file_id: Option<String>,
    pub remote_store_id: Option<String>,
    /// Set when a newer row for the same path superseded this one
    pub stale: bool,
}

crate::builder! {
    pub struct FileRecordBuilder => FileRecord {
        into {
            path: String = "/corpus/essays/sample.txt",
            content_hash: String = "0000000000000000000000000000000000000000000000000000000000000000",
            meta_json: String = "{}",
            updated_at: String = "2026-01-01T00:00:00+00:00",
        }
        set {
            mtime_ms: u64 = 0,
            state: FileState = FileState::Untracked,
            version: i64 = 0,
            stale: bool = false,
        }
        option {
            enrichment_json: String = None,
            last_error: String = None,
            failure_stage: String = None,
            remote_file_id: String = None,
            remote_store_id: String = None,
        }
    }
}

/// Event-specific fields written alongside a state change.
///
/// `upload_complete` carries the remote identifiers; `fail_*` carry the
/// diagnostic. Everything is optional so `start_upload` and
/// `processing_complete` can pass an empty payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_store_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_stage: Option<String>,
}

impl TransitionPayload {
    pub fn uploaded(remote_file_id: impl Into<String>, remote_store_id: impl Into<String>) -> Self {
        Self {
            remote_file_id: Some(remote_file_id.into()),
            remote_store_id: Some(remote_store_id.into()),
            ..Self::default()
        }
    }

    pub fn failure(stage: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            failure_stage: Some(stage.into()),
            ..Self::default()
        }
    }
}

/// One row per unique (file id, passage text) pair, upserted on every query
/// that returns grounding chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    pub passage_id: String,
    pub file_id: String,
    pub content_hash: String,
    pub passage_text: String,
    pub stale: bool,
    pub created_at: String,
    pub last_seen_at: String,
}

/// A research session grouping user-visible actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    pub created_at: String,
    /// Auto-advanced by trigger on event insert
    pub updated_at: String,
}

/// Type of a session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Search,
    View,
    Synthesize,
    Note,
    Error,
}

crate::simple_display! {
    EventType {
        Search => "search",
        View => "view",
        Synthesize => "synthesize",
        Note => "note",
        Error => "error",
    }
}

impl EventType {
    pub fn parse(s: &str) -> Option<Self> {
        [
            EventType::Search,
            EventType::View,
            EventType::Synthesize,
            EventType::Note,
            EventType::Error,
        ]
        .into_iter()
        .find(|t| t.to_string() == s)
    }
}

/// Append-only session event. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEventRecord {
    /// Monotonic within the store
    pub id: i64,
    pub session_id: String,
    pub event_type: EventType,
    pub payload_json: String,
    pub created_at: String,
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
