// SPDX-License-Identifier: MIT

//! The index service facade: upload, poll, query.

use crate::error::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Handle for an in-flight remote upload operation.
///
/// Uploads are idempotent by content hash: re-submitting the same content
/// after a crash re-attaches to the same remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub operation_id: String,
    pub content_hash: String,
}

/// State of a polled remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Ready {
        file_id: String,
        store_id: String,
    },
    Failed {
        reason: String,
    },
}

/// Optional metadata scoping for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.course.is_none()
    }
}

/// A passage returned by the index service as retrieval evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    pub file_id: String,
    pub text: String,
    /// Opaque metadata echoed back by the service (scanner conventions
    /// parse it into [`carrel_core::CorpusMeta`] where needed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Adapter for the external managed retrieval service.
#[async_trait]
pub trait IndexAdapter: Send + Sync + 'static {
    /// Submit a file for indexing. Returns immediately with an operation
    /// handle; indexing completes asynchronously on the remote.
    async fn upload(
        &self,
        local_path: &Path,
        metadata: &serde_json::Value,
    ) -> Result<UploadTicket, AdapterError>;

    /// Check an in-flight operation.
    async fn poll(&self, ticket: &UploadTicket) -> Result<PollStatus, AdapterError>;

    /// Retrieve top-K grounding chunks for a query.
    async fn query(
        &self,
        store_ids: &[String],
        query: &str,
        filters: &QueryFilters,
        top_k: usize,
    ) -> Result<Vec<GroundingChunk>, AdapterError>;
}
