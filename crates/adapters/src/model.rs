// SPDX-License-Identifier: MIT

//! The ranking/generation model facade used by the search pipeline.

use crate::error::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A cited claim from synthesis. The quote must be verifiable as a
/// substring of the stored passage (after normalization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_text: String,
    pub citation: Citation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub file_id: String,
    pub passage_id: String,
    pub quote: String,
}

/// Structured synthesis result: grounded claims plus an optional
/// non-factual summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub claims: Vec<Claim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// One synthesis attempt. `retry_feedback` names the specific citation
/// failures from a prior attempt when re-prompting.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub query: String,
    /// (passage_id, file_id, passage_text) triples the model may cite.
    pub passages: Vec<(String, String, String)>,
    pub retry_feedback: Option<String>,
}

/// Adapter for the external ranking/generation model.
#[async_trait]
pub trait ModelAdapter: Send + Sync + 'static {
    /// Order passages by relevance to the query.
    ///
    /// One structured call returning indices into `passages`, best first.
    /// Passages are pre-truncated by the caller to bound token cost.
    async fn rank(&self, query: &str, passages: &[String]) -> Result<Vec<usize>, AdapterError>;

    /// Produce claims with citations over the supplied passages.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis, AdapterError>;
}
