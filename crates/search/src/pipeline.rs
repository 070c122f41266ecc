// SPDX-License-Identifier: MIT

//! The staged search pipeline.
//!
//! Only retrieval is load-bearing; every stage after it degrades to a
//! weaker but well-defined result and records a warning. Grounding chunks
//! are given durable passage identities before reranking so citations
//! survive re-indexing.

use crate::diversify::{diversify, DEFAULT_MAX_PER_FILE};
use crate::error::SearchError;
use crate::glossary::Glossary;
use crate::normalize::validate_claims;
use carrel_adapters::{
    GroundingChunk, IndexAdapter, ModelAdapter, QueryFilters, Synthesis, SynthesisRequest,
};
use carrel_core::{Clock, CorpusMeta, EventType};
use carrel_store::Store;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_TOP_K: usize = 50;
const RESULT_WINDOW: usize = 10;
/// Passages are truncated to this many characters for the rerank call.
const RERANK_PREFIX_CHARS: usize = 500;
/// Below this many eligible passages, synthesis is skipped entirely.
const MIN_SYNTHESIS_PASSAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Reorder the result window by difficulty for guided reading
    Learn,
    /// Leave rerank order untouched
    #[default]
    Research,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub filters: QueryFilters,
    pub mode: SearchMode,
    pub expand: bool,
    pub rerank: bool,
    pub synthesize: bool,
    pub store_ids: Vec<String>,
    pub session_id: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            filters: QueryFilters::default(),
            mode: SearchMode::default(),
            expand: true,
            rerank: true,
            synthesize: false,
            store_ids: Vec::new(),
            session_id: None,
        }
    }
}

/// A passage with its durable identity and final position.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPassage {
    pub passage_id: String,
    pub file_id: String,
    pub text: String,
    /// Position after reranking, 0-based
    pub rank: usize,
    pub course: Option<String>,
    pub difficulty: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub expanded_query: String,
    pub passages: Vec<RankedPassage>,
    /// Present only when synthesis ran and at least one claim validated
    pub synthesis: Option<Synthesis>,
    pub warnings: Vec<String>,
}

/// Orchestrates one search request through all stages.
pub struct SearchPipeline<I: IndexAdapter, M: ModelAdapter, C: Clock> {
    index: Arc<I>,
    model: Arc<M>,
    store: Store,
    glossary: Option<Glossary>,
    clock: C,
}

impl<I: IndexAdapter, M: ModelAdapter, C: Clock> SearchPipeline<I, M, C> {
    pub fn new(index: Arc<I>, model: Arc<M>, store: Store, clock: C) -> Self {
        Self {
            index,
            model,
            store,
            glossary: None,
            clock,
        }
    }

    pub fn with_glossary(mut self, glossary: Glossary) -> Self {
        self.glossary = Some(glossary);
        self
    }

    pub async fn run(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let mut warnings = Vec::new();

        // 1. Expand.
        let expanded_query = match (&self.glossary, request.expand) {
            (Some(glossary), true) => {
                let expansion = glossary.expand(&request.query);
                if !expansion.matched.is_empty() {
                    tracing::debug!(matched = ?expansion.matched, "query expanded");
                }
                expansion.expanded
            }
            _ => request.query.clone(),
        };

        // 2. Retrieve. The only stage whose failure fails the request.
        let chunks = match self
            .index
            .query(&request.store_ids, &expanded_query, &request.filters, request.top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(err) => {
                self.emit(request, EventType::Error, serde_json::json!({
                    "stage": "retrieve",
                    "error": err.to_string(),
                }));
                return Err(SearchError::Retrieve(err));
            }
        };

        // 3. Durable passage identity, before any reordering.
        let mut passages = self.register_passages(&chunks)?;

        // 4. Rerank; failure keeps retrieval order.
        if request.rerank && passages.len() > 1 {
            match self.rerank(&expanded_query, &passages).await {
                Ok(reordered) => passages = reordered,
                Err(err) => {
                    warnings.push(format!("rerank failed, keeping retrieval order: {err}"));
                    self.emit(request, EventType::Error, serde_json::json!({
                        "stage": "rerank",
                        "error": err.to_string(),
                    }));
                }
            }
        }

        // 5. Diversify into the result window.
        let mut selected = diversify(&passages, RESULT_WINDOW, DEFAULT_MAX_PER_FILE);

        // 6. Learn mode: easiest material first, rerank order as tiebreak.
        if request.mode == SearchMode::Learn {
            selected.sort_by_key(|p| (p.difficulty.unwrap_or(2), p.rank));
        }

        // 7. Synthesize + validate.
        let synthesis = if request.synthesize {
            self.synthesize(request, &selected, &mut warnings).await
        } else {
            None
        };

        // 8. Events.
        self.emit(request, EventType::Search, serde_json::json!({
            "query": request.query,
            "expanded": expanded_query,
            "passages": selected.len(),
        }));
        if let Some(synthesis) = &synthesis {
            self.emit(request, EventType::Synthesize, serde_json::json!({
                "claims": synthesis.claims.len(),
            }));
        }

        Ok(SearchResponse {
            expanded_query,
            passages: selected,
            synthesis,
            warnings,
        })
    }

    /// Upsert every chunk and attach its deterministic passage id.
    fn register_passages(
        &self,
        chunks: &[GroundingChunk],
    ) -> Result<Vec<RankedPassage>, SearchError> {
        let now = self.clock.rfc3339();
        let mut passages = Vec::with_capacity(chunks.len());
        for (rank, chunk) in chunks.iter().enumerate() {
            let passage_id = self.store.touch_passage(&chunk.file_id, &chunk.text, &now)?;
            let meta: CorpusMeta = chunk
                .meta
                .clone()
                .and_then(|value| serde_json::from_value(value).ok())
                .unwrap_or_default();
            passages.push(RankedPassage {
                passage_id,
                file_id: chunk.file_id.clone(),
                text: chunk.text.clone(),
                rank,
                course: meta.course,
                difficulty: meta.difficulty,
            });
        }
        Ok(passages)
    }

    /// One structured rank call over bounded prefixes.
    async fn rerank(
        &self,
        query: &str,
        passages: &[RankedPassage],
    ) -> Result<Vec<RankedPassage>, carrel_adapters::AdapterError> {
        let prefixes: Vec<String> = passages
            .iter()
            .map(|p| p.text.chars().take(RERANK_PREFIX_CHARS).collect())
            .collect();
        let order = self.model.rank(query, &prefixes).await?;

        // Defend against a sloppy model: dedupe, bound, and append anything
        // it forgot in original order.
        let mut seen = vec![false; passages.len()];
        let mut reordered = Vec::with_capacity(passages.len());
        for index in order {
            if index < passages.len() && !seen[index] {
                seen[index] = true;
                reordered.push(passages[index].clone());
            }
        }
        for (index, was_seen) in seen.iter().enumerate() {
            if !was_seen {
                reordered.push(passages[index].clone());
            }
        }
        for (rank, passage) in reordered.iter_mut().enumerate() {
            passage.rank = rank;
        }
        Ok(reordered)
    }

    /// Synthesis with citation validation and a single corrective re-prompt.
    async fn synthesize(
        &self,
        request: &SearchRequest,
        selected: &[RankedPassage],
        warnings: &mut Vec<String>,
    ) -> Option<Synthesis> {
        if selected.len() < MIN_SYNTHESIS_PASSAGES {
            warnings.push(format!(
                "synthesis skipped: only {} passages (needs {MIN_SYNTHESIS_PASSAGES})",
                selected.len()
            ));
            return None;
        }

        let passage_texts: HashMap<String, String> = selected
            .iter()
            .map(|p| (p.passage_id.clone(), p.text.clone()))
            .collect();
        let triples: Vec<(String, String, String)> = selected
            .iter()
            .map(|p| (p.passage_id.clone(), p.file_id.clone(), p.text.clone()))
            .collect();

        let mut feedback: Option<String> = None;
        for attempt in 0..2 {
            let result = self
                .model
                .synthesize(&SynthesisRequest {
                    query: request.query.clone(),
                    passages: triples.clone(),
                    retry_feedback: feedback.take(),
                })
                .await;
            let synthesis = match result {
                Ok(synthesis) => synthesis,
                Err(err) => {
                    warnings.push(format!("synthesis failed, returning excerpts: {err}"));
                    self.emit(request, EventType::Error, serde_json::json!({
                        "stage": "synthesize",
                        "error": err.to_string(),
                    }));
                    return None;
                }
            };

            let (valid, failures) = validate_claims(&synthesis.claims, &passage_texts);
            if failures.is_empty() {
                return Some(synthesis);
            }
            if attempt == 0 {
                // Name the failures and give the model one more try.
                let detail: Vec<String> = failures.iter().map(|f| f.describe()).collect();
                feedback = Some(detail.join("; "));
                tracing::debug!(failures = failures.len(), "re-prompting synthesis");
                continue;
            }
            // Second attempt: keep what validated, or fall back entirely.
            if valid.is_empty() {
                warnings.push("no claims survived citation validation; returning excerpts".into());
                self.emit(request, EventType::Error, serde_json::json!({
                    "stage": "validate",
                    "error": "all claims failed citation validation",
                }));
                return None;
            }
            warnings.push(format!("{} claims dropped by citation validation", failures.len()));
            return Some(Synthesis {
                claims: valid,
                summary: synthesis.summary,
            });
        }
        None
    }

    fn emit(&self, request: &SearchRequest, event_type: EventType, payload: serde_json::Value) {
        let Some(session_id) = &request.session_id else {
            return;
        };
        if let Err(err) =
            self.store
                .append_event(session_id, event_type, &payload, &self.clock.rfc3339())
        {
            tracing::warn!(error = %err, "failed to append session event");
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
