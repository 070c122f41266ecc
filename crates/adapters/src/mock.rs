// SPDX-License-Identifier: MIT

//! In-process fake of the index and model services.
//!
//! Drives the adversarial harness and the workspace specs: configurable
//! latency profiles, scriptable failures, and upload idempotency by content
//! hash, all deterministic under a fixed seed.

use crate::error::AdapterError;
use crate::index::{GroundingChunk, IndexAdapter, PollStatus, QueryFilters, UploadTicket};
use crate::model::{ModelAdapter, Synthesis, SynthesisRequest};
use async_trait::async_trait;
use carrel_core::content_hash;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Simulated service latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyProfile {
    /// No delay; for tight loops in unit tests
    #[default]
    Zero,
    /// Constant 2s, the observed remote indexing cadence
    Realistic,
    /// Every third request answers 429 with a 1s retry-after
    RateLimited,
}

#[derive(Default)]
struct MockState {
    /// content hash → operation id (uploads are idempotent)
    operations_by_hash: HashMap<String, String>,
    /// operation id → polls remaining until ready
    pending_polls: HashMap<String, u32>,
    /// errors consumed by the next matching calls, FIFO
    upload_errors: VecDeque<AdapterError>,
    query_errors: VecDeque<AdapterError>,
    rank_errors: VecDeque<AdapterError>,
    synthesis_errors: VecDeque<AdapterError>,
    /// synthesis results, FIFO; last one repeats
    syntheses: VecDeque<Synthesis>,
    chunks: Vec<GroundingChunk>,
    rank_order: Option<Vec<usize>>,
    /// uploads rejected with CreditExhausted once this many succeeded
    credit_limit: Option<usize>,
    upload_count: usize,
    request_count: usize,
    upload_paths: Vec<String>,
    queries: Vec<String>,
}

/// Deterministic fake satisfying both adapter traits.
#[derive(Clone)]
pub struct MockIndex {
    latency: LatencyProfile,
    polls_until_ready: u32,
    rng: Arc<Mutex<StdRng>>,
    state: Arc<Mutex<MockState>>,
}

impl MockIndex {
    pub fn new(latency: LatencyProfile, seed: u64) -> Self {
        Self {
            latency,
            polls_until_ready: 1,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Zero-latency mock with a fixed default seed.
    pub fn instant() -> Self {
        Self::new(LatencyProfile::Zero, 0)
    }

    /// How many polls an operation stays pending (default 1).
    pub fn polls_until_ready(mut self, polls: u32) -> Self {
        self.polls_until_ready = polls;
        self
    }

    // ── Scripting ────────────────────────────────────────────────────────

    /// Queue an error for the next upload call.
    pub fn script_upload_error(&self, error: AdapterError) {
        self.state.lock().upload_errors.push_back(error);
    }

    /// Reject uploads with `CreditExhausted` once `n` have succeeded.
    pub fn exhaust_credits_after(&self, n: usize) {
        self.state.lock().credit_limit = Some(n);
    }

    /// Queue an error for the next query call.
    pub fn script_query_error(&self, error: AdapterError) {
        self.state.lock().query_errors.push_back(error);
    }

    /// Queue an error for the next rank call.
    pub fn script_rank_error(&self, error: AdapterError) {
        self.state.lock().rank_errors.push_back(error);
    }

    /// Queue an error for the next synthesize call.
    pub fn script_synthesis_error(&self, error: AdapterError) {
        self.state.lock().synthesis_errors.push_back(error);
    }

    /// Queue a synthesis result; the last queued result repeats.
    pub fn push_synthesis(&self, synthesis: Synthesis) {
        self.state.lock().syntheses.push_back(synthesis);
    }

    /// Grounding chunks returned by every query.
    pub fn set_chunks(&self, chunks: Vec<GroundingChunk>) {
        self.state.lock().chunks = chunks;
    }

    /// Explicit rank order (indices into the passage list).
    pub fn set_rank_order(&self, order: Vec<usize>) {
        self.state.lock().rank_order = Some(order);
    }

    // ── Assertions ───────────────────────────────────────────────────────

    pub fn upload_paths(&self) -> Vec<String> {
        self.state.lock().upload_paths.clone()
    }

    pub fn upload_count(&self) -> usize {
        self.state.lock().upload_count
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }

    /// Stable fake file id for a content hash.
    pub fn file_id_for_hash(hash: &str) -> String {
        format!("files/{}", &hash[..hash.len().min(12)])
    }

    async fn simulate_latency(&self) -> Result<(), AdapterError> {
        match self.latency {
            LatencyProfile::Zero => Ok(()),
            LatencyProfile::Realistic => {
                let jitter = self.rng.lock().gen_range(0..100);
                tokio::time::sleep(Duration::from_millis(2000 + jitter)).await;
                Ok(())
            }
            LatencyProfile::RateLimited => {
                let count = {
                    let mut state = self.state.lock();
                    state.request_count += 1;
                    state.request_count
                };
                if count % 3 == 0 {
                    return Err(AdapterError::RateLimited {
                        retry_after: Some(Duration::from_secs(1)),
                    });
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl IndexAdapter for MockIndex {
    async fn upload(
        &self,
        local_path: &Path,
        _metadata: &serde_json::Value,
    ) -> Result<UploadTicket, AdapterError> {
        self.simulate_latency().await?;

        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| AdapterError::Rejected(format!("unreadable file: {e}")))?;
        let hash = content_hash(&content);

        let mut state = self.state.lock();
        if let Some(err) = state.upload_errors.pop_front() {
            return Err(err);
        }
        if let Some(limit) = state.credit_limit {
            if state.upload_count >= limit {
                return Err(AdapterError::CreditExhausted);
            }
        }
        state.upload_paths.push(local_path.display().to_string());

        // Idempotent by content hash: a re-upload re-attaches to the
        // existing operation instead of creating a duplicate.
        if let Some(operation_id) = state.operations_by_hash.get(&hash) {
            return Ok(UploadTicket {
                operation_id: operation_id.clone(),
                content_hash: hash,
            });
        }

        state.upload_count += 1;
        let operation_id = format!("operations/{}", state.upload_count);
        state.operations_by_hash.insert(hash.clone(), operation_id.clone());
        state.pending_polls.insert(operation_id.clone(), self.polls_until_ready);
        Ok(UploadTicket {
            operation_id,
            content_hash: hash,
        })
    }

    async fn poll(&self, ticket: &UploadTicket) -> Result<PollStatus, AdapterError> {
        self.simulate_latency().await?;

        let mut state = self.state.lock();
        match state.pending_polls.get_mut(&ticket.operation_id) {
            None => Ok(PollStatus::Failed {
                reason: format!("unknown operation {}", ticket.operation_id),
            }),
            Some(0) => Ok(PollStatus::Ready {
                file_id: Self::file_id_for_hash(&ticket.content_hash),
                store_id: "stores/mock".to_string(),
            }),
            Some(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    Ok(PollStatus::Ready {
                        file_id: Self::file_id_for_hash(&ticket.content_hash),
                        store_id: "stores/mock".to_string(),
                    })
                } else {
                    Ok(PollStatus::Pending)
                }
            }
        }
    }

    async fn query(
        &self,
        _store_ids: &[String],
        query: &str,
        _filters: &QueryFilters,
        top_k: usize,
    ) -> Result<Vec<GroundingChunk>, AdapterError> {
        self.simulate_latency().await?;
        let mut state = self.state.lock();
        if let Some(err) = state.query_errors.pop_front() {
            return Err(err);
        }
        state.queries.push(query.to_string());
        Ok(state.chunks.iter().take(top_k).cloned().collect())
    }
}

#[async_trait]
impl ModelAdapter for MockIndex {
    async fn rank(&self, _query: &str, passages: &[String]) -> Result<Vec<usize>, AdapterError> {
        self.simulate_latency().await?;
        let mut state = self.state.lock();
        if let Some(err) = state.rank_errors.pop_front() {
            return Err(err);
        }
        Ok(state
            .rank_order
            .clone()
            .unwrap_or_else(|| (0..passages.len()).collect()))
    }

    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Synthesis, AdapterError> {
        self.simulate_latency().await?;
        let mut state = self.state.lock();
        if let Some(err) = state.synthesis_errors.pop_front() {
            return Err(err);
        }
        if state.syntheses.len() > 1 {
            Ok(state.syntheses.pop_front().unwrap_or_default())
        } else {
            Ok(state.syntheses.front().cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
