// SPDX-License-Identifier: MIT

//! HTTP implementation of the index and model adapters.
//!
//! Owns authentication, per-attempt timeouts, bounded jittered retries on
//! transient failures, and the mapping from wire status to failure class.
//! Callers above this module never see a status code.

use crate::error::AdapterError;
use crate::index::{GroundingChunk, IndexAdapter, PollStatus, QueryFilters, UploadTicket};
use crate::model::{ModelAdapter, Synthesis, SynthesisRequest};
use async_trait::async_trait;
use carrel_core::content_hash;
use rand::Rng;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(60);
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the remote service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    /// Store the corpus uploads into.
    pub store_id: String,
}

/// reqwest-backed adapter for both the index and the ranking model.
#[derive(Clone)]
pub struct RemoteIndex {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteIndex {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST a JSON body, retrying transient failures with jittered
    /// exponential backoff. Non-transient classes return immediately.
    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, AdapterError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            let result = self
                .http
                .post(self.url(path))
                .bearer_auth(&self.config.api_key)
                .json(body)
                .timeout(timeout)
                .send()
                .await;

            let err = match result {
                Ok(response) => match check_status(response).await {
                    Ok(response) => {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|e| AdapterError::Rejected(format!("malformed response: {e}")))
                    }
                    Err(err) => err,
                },
                Err(e) if e.is_timeout() || e.is_connect() => {
                    AdapterError::Transient(e.to_string())
                }
                Err(e) => AdapterError::Rejected(e.to_string()),
            };

            match err {
                AdapterError::Transient(reason) if attempt < RETRY_ATTEMPTS => {
                    let jitter = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 2);
                    let wait = delay + Duration::from_millis(jitter);
                    tracing::debug!(attempt, wait_ms = wait.as_millis() as u64, %reason, "retrying remote call");
                    tokio::time::sleep(wait).await;
                    delay *= 2;
                    attempt += 1;
                }
                other => return Err(other),
            }
        }
    }
}

/// Map an HTTP response to its failure class, passing success through.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(AdapterError::RateLimited { retry_after });
    }
    if status == reqwest::StatusCode::PAYMENT_REQUIRED {
        return Err(AdapterError::CreditExhausted);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(AdapterError::Transient(format!("{status}: {body}")));
    }
    Err(AdapterError::Rejected(format!("{status}: {body}")))
}

#[derive(Deserialize)]
struct UploadResponse {
    operation_id: String,
}

#[derive(Deserialize)]
struct OperationResponse {
    state: String,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    store_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct RankResponse {
    order: Vec<usize>,
}

#[async_trait]
impl IndexAdapter for RemoteIndex {
    async fn upload(
        &self,
        local_path: &Path,
        metadata: &serde_json::Value,
    ) -> Result<UploadTicket, AdapterError> {
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| AdapterError::Rejected(format!("unreadable file {}: {e}", local_path.display())))?;
        let hash = content_hash(&content);
        let text = String::from_utf8_lossy(&content).into_owned();

        let body = serde_json::json!({
            "store_id": self.config.store_id,
            "content_hash": hash,
            "display_name": local_path.file_name().and_then(|n| n.to_str()),
            "metadata": metadata,
            "content": text,
        });
        let response: UploadResponse =
            self.post_json("v1/uploads", &body, UPLOAD_TIMEOUT).await?;
        tracing::debug!(path = %local_path.display(), operation = %response.operation_id, "upload submitted");
        Ok(UploadTicket {
            operation_id: response.operation_id,
            content_hash: hash,
        })
    }

    async fn poll(&self, ticket: &UploadTicket) -> Result<PollStatus, AdapterError> {
        let body = serde_json::json!({ "operation_id": ticket.operation_id });
        let response: OperationResponse =
            self.post_json("v1/operations/get", &body, POLL_TIMEOUT).await?;
        match response.state.as_str() {
            "pending" | "running" => Ok(PollStatus::Pending),
            "done" => {
                let file_id = response
                    .file_id
                    .ok_or_else(|| AdapterError::Rejected("operation done without file_id".into()))?;
                Ok(PollStatus::Ready {
                    file_id,
                    store_id: response.store_id.unwrap_or_else(|| self.config.store_id.clone()),
                })
            }
            "failed" => Ok(PollStatus::Failed {
                reason: response.error.unwrap_or_else(|| "unspecified".into()),
            }),
            other => Err(AdapterError::Rejected(format!("unknown operation state '{other}'"))),
        }
    }

    async fn query(
        &self,
        store_ids: &[String],
        query: &str,
        filters: &QueryFilters,
        top_k: usize,
    ) -> Result<Vec<GroundingChunk>, AdapterError> {
        let body = serde_json::json!({
            "store_ids": store_ids,
            "query": query,
            "filters": filters,
            "top_k": top_k,
        });
        let response: QueryResponse =
            self.post_json("v1/stores/query", &body, QUERY_TIMEOUT).await?;
        Ok(response.chunks)
    }
}

#[async_trait]
impl ModelAdapter for RemoteIndex {
    async fn rank(&self, query: &str, passages: &[String]) -> Result<Vec<usize>, AdapterError> {
        let body = serde_json::json!({
            "query": query,
            "passages": passages,
            "temperature": 0.0,
        });
        let response: RankResponse =
            self.post_json("v1/model/rank", &body, QUERY_TIMEOUT).await?;
        Ok(response.order)
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis, AdapterError> {
        let passages: Vec<serde_json::Value> = request
            .passages
            .iter()
            .map(|(passage_id, file_id, text)| {
                serde_json::json!({
                    "passage_id": passage_id,
                    "file_id": file_id,
                    "text": text,
                })
            })
            .collect();
        let body = serde_json::json!({
            "query": request.query,
            "passages": passages,
            "feedback": request.retry_feedback,
            "temperature": 0.0,
        });
        self.post_json("v1/model/synthesize", &body, UPLOAD_TIMEOUT).await
    }
}
