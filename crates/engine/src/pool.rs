// SPDX-License-Identifier: MIT

//! Bounded concurrent worker pool.
//!
//! Workers are interchangeable: each claims an eligible row, decides the
//! next event from its current state, calls the adapter through the rate
//! limiter, and submits the transition. The store is the queue; an
//! in-process claim set just keeps two workers off the same path within a
//! run. Credit exhaustion checkpoints and stops the pool cleanly; the
//! breaker pauses or halts it.

use crate::checkpoint::CheckpointMarker;
use crate::error::EngineError;
use crate::limiter::{BreakerVerdict, CircuitBreaker, RateLimiter};
use crate::transition::{TransitionManager, TransitionOutcome};
use carrel_adapters::{AdapterError, IndexAdapter, PollStatus, UploadTicket};
use carrel_core::{Clock, EventType, FailureKind, FileRecord, FileState, IngestEvent, TransitionPayload};
use carrel_store::Store;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Concurrent workers, aligned to the remote service's concurrency
    pub workers: usize,
    /// Rows fetched per claim attempt
    pub batch_size: usize,
    /// Transient failures tolerated per file before it is failed
    pub max_transient_retries: u32,
    /// Sleep when a remote operation is still pending or no row is claimable
    pub idle_backoff: Duration,
    /// Session to receive pool-level error events
    pub session_id: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 16,
            max_transient_retries: 3,
            idle_backoff: Duration::from_millis(200),
            session_id: None,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(workers: usize) -> Result<Self, EngineError> {
        if !(1..=16).contains(&workers) {
            return Err(EngineError::InvalidConfig(format!(
                "worker count must be 1..=16, got {workers}"
            )));
        }
        Ok(Self {
            workers,
            ..Self::default()
        })
    }
}

/// What a pool run accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub transitions: usize,
    pub indexed: usize,
    pub failed: usize,
    /// Pool stopped on credit exhaustion; a checkpoint marker was written
    pub credit_paused: bool,
    /// Circuit breaker halted the pool
    pub halted: bool,
}

#[derive(Default)]
struct PoolShared {
    /// Paths currently held by a worker
    claims: HashSet<String>,
    /// path → in-flight upload ticket (rebuilt via idempotent re-upload
    /// after a restart)
    tickets: HashMap<String, UploadTicket>,
    /// path → consecutive transient failures
    retries: HashMap<String, u32>,
    /// Rows whose entry hook failed after commit; next tick drives them
    /// to failed
    postcommit: HashSet<String>,
}

enum StepVerdict {
    Continue,
    CreditExhausted,
}

/// The ingestion executor.
pub struct IngestPool<A: IndexAdapter, C: Clock> {
    store: Store,
    adapter: Arc<A>,
    manager: Arc<TransitionManager<C>>,
    limiter: Arc<RateLimiter<C>>,
    breaker: Arc<CircuitBreaker<C>>,
    clock: C,
    config: PoolConfig,
    cancel: CancellationToken,
    shared: Arc<Mutex<PoolShared>>,
    report: Arc<Mutex<PoolReport>>,
}

impl<A: IndexAdapter, C: Clock> IngestPool<A, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        adapter: Arc<A>,
        manager: Arc<TransitionManager<C>>,
        limiter: Arc<RateLimiter<C>>,
        breaker: Arc<CircuitBreaker<C>>,
        clock: C,
        config: PoolConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            adapter,
            manager,
            limiter,
            breaker,
            clock,
            config,
            cancel,
            shared: Arc::new(Mutex::new(PoolShared::default())),
            report: Arc::new(Mutex::new(PoolReport::default())),
        }
    }

    /// Drive every eligible row to a terminal state (or until cancelled,
    /// paused, or halted).
    pub async fn run(self: Arc<Self>) -> Result<PoolReport, EngineError> {
        let marker_path = CheckpointMarker::path_for(self.store.path());
        if let Some(marker) = CheckpointMarker::read(&marker_path)? {
            tracing::info!(
                reason = %marker.reason,
                remaining = marker.remaining,
                "resuming from checkpoint"
            );
            CheckpointMarker::clear(&marker_path)?;
        }

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers {
            let pool = Arc::clone(&self);
            workers.spawn(async move { pool.worker_loop(worker_id).await });
        }
        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    // Crash-fail: stop the pool, keep the first cause.
                    tracing::error!(error = %err, "worker failed");
                    self.cancel.cancel();
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    self.cancel.cancel();
                    first_error
                        .get_or_insert(EngineError::Halted(format!("worker panicked: {join_err}")));
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(*self.report.lock()),
        }
    }

    async fn worker_loop(&self, worker_id: usize) -> Result<(), EngineError> {
        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(worker_id, "cancelled; exiting");
                return Ok(());
            }

            match self.breaker.check() {
                BreakerVerdict::Proceed => {}
                BreakerVerdict::Pause(wait) => {
                    tracing::info!(worker_id, wait_ms = wait.as_millis() as u64, "breaker pause");
                    tokio::time::sleep(wait.min(Duration::from_secs(5))).await;
                    continue;
                }
                BreakerVerdict::Halt => {
                    self.emit_error_event("circuit breaker halted the ingest pool");
                    self.report.lock().halted = true;
                    self.cancel.cancel();
                    return Ok(());
                }
            }

            let Some(record) = self.claim()? else {
                let idle = { self.shared.lock().claims.is_empty() };
                if idle {
                    // Nothing claimable and nothing in flight: done.
                    return Ok(());
                }
                tokio::time::sleep(self.config.idle_backoff).await;
                continue;
            };

            let path = record.path.clone();
            let verdict = self.step(record).await;
            self.shared.lock().claims.remove(&path);

            match verdict {
                Ok(StepVerdict::Continue) => {}
                Ok(StepVerdict::CreditExhausted) => {
                    self.pause_for_credits()?;
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Claim the first eligible row not already held by a worker.
    fn claim(&self) -> Result<Option<FileRecord>, EngineError> {
        let rows = self
            .store
            .list_eligible(&FileState::ELIGIBLE, self.config.batch_size)?;
        let mut shared = self.shared.lock();
        for record in rows {
            if shared.claims.insert(record.path.clone()) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// One tick for one file: decide the event from its current state.
    async fn step(&self, record: FileRecord) -> Result<StepVerdict, EngineError> {
        // A row whose previous entry hook failed after commit gets driven
        // to failed before anything else touches it.
        let needs_postcommit_recovery = self.shared.lock().postcommit.remove(&record.path);
        if needs_postcommit_recovery {
            let event = match record.state {
                FileState::Uploading => Some(IngestEvent::FailUpload),
                FileState::Processing => Some(IngestEvent::FailProcessing),
                _ => None,
            };
            if let Some(event) = event {
                let payload = TransitionPayload::failure(
                    "post_commit_entry",
                    "entry hook failed after commit",
                );
                self.submit(&record.path, event, payload).await?;
            }
            return Ok(StepVerdict::Continue);
        }

        match record.state {
            FileState::Untracked => self.step_untracked(&record).await,
            FileState::Uploading => self.step_polling(&record, IngestEvent::UploadComplete).await,
            FileState::Processing => {
                self.step_polling(&record, IngestEvent::ProcessingComplete).await
            }
            // Terminal rows are not eligible; nothing to do.
            FileState::Indexed | FileState::Failed => Ok(StepVerdict::Continue),
        }
    }

    async fn step_untracked(&self, record: &FileRecord) -> Result<StepVerdict, EngineError> {
        self.limiter.acquire(upload_token_estimate(&record.path)).await;
        let metadata = metadata_json(record);
        match self.adapter.upload(Path::new(&record.path), &metadata).await {
            Ok(ticket) => {
                self.shared.lock().tickets.insert(record.path.clone(), ticket);
                self.submit(&record.path, IngestEvent::StartUpload, TransitionPayload::default())
                    .await?;
                Ok(StepVerdict::Continue)
            }
            Err(err) => self.handle_adapter_error(record, "upload", err).await,
        }
    }

    /// Poll the remote operation for a row in `uploading` or `processing`.
    async fn step_polling(
        &self,
        record: &FileRecord,
        complete_event: IngestEvent,
    ) -> Result<StepVerdict, EngineError> {
        let ticket = { self.shared.lock().tickets.get(&record.path).cloned() };
        let ticket = match ticket {
            Some(ticket) => ticket,
            // After a restart the ticket cache is empty; re-upload is
            // idempotent by content hash and re-attaches to the operation.
            None => {
                self.limiter.acquire(upload_token_estimate(&record.path)).await;
                let metadata = metadata_json(record);
                match self.adapter.upload(Path::new(&record.path), &metadata).await {
                    Ok(ticket) => {
                        self.shared
                            .lock()
                            .tickets
                            .insert(record.path.clone(), ticket.clone());
                        ticket
                    }
                    Err(err) => {
                        return self
                            .handle_adapter_error(record, stage_for(record.state), err)
                            .await
                    }
                }
            }
        };

        self.limiter.acquire(1).await;
        match self.adapter.poll(&ticket).await {
            Ok(PollStatus::Pending) => {
                tokio::time::sleep(self.config.idle_backoff).await;
                Ok(StepVerdict::Continue)
            }
            Ok(PollStatus::Ready { file_id, store_id }) => {
                let payload = if complete_event == IngestEvent::UploadComplete {
                    TransitionPayload::uploaded(file_id, store_id)
                } else {
                    TransitionPayload::default()
                };
                self.submit(&record.path, complete_event, payload).await?;
                Ok(StepVerdict::Continue)
            }
            Ok(PollStatus::Failed { reason }) => {
                let stage = stage_for(record.state);
                self.submit(
                    &record.path,
                    fail_event_for(record.state),
                    TransitionPayload::failure(stage, reason),
                )
                .await?;
                Ok(StepVerdict::Continue)
            }
            Err(err) => {
                self.handle_adapter_error(record, stage_for(record.state), err).await
            }
        }
    }

    /// Classify an adapter failure and act per the taxonomy.
    async fn handle_adapter_error(
        &self,
        record: &FileRecord,
        stage: &str,
        err: AdapterError,
    ) -> Result<StepVerdict, EngineError> {
        let kind = err.failure_kind();
        tracing::warn!(path = %record.path, %kind, error = %err, "adapter failure");
        match kind {
            FailureKind::Transient => {
                self.breaker.record(false);
                let retries = {
                    let mut shared = self.shared.lock();
                    let count = shared.retries.entry(record.path.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                if retries > self.config.max_transient_retries {
                    self.fail_file(record, stage, &format!("transient retries exhausted: {err}"))
                        .await?;
                }
                Ok(StepVerdict::Continue)
            }
            FailureKind::RateLimit { .. } => {
                self.limiter.on_rate_limited(kind.retry_after());
                Ok(StepVerdict::Continue)
            }
            FailureKind::CreditExhausted => Ok(StepVerdict::CreditExhausted),
            FailureKind::Reject => {
                self.breaker.record(false);
                self.fail_file(record, stage, &err.to_string()).await?;
                Ok(StepVerdict::Continue)
            }
            FailureKind::GuardStale | FailureKind::IntegrityViolation => {
                // Adapters never produce these.
                Err(EngineError::Adapter(err))
            }
        }
    }

    /// Drive a row to `failed`, inserting the `start_upload` edge first when
    /// the row is still untracked (there is no direct untracked → failed
    /// edge).
    async fn fail_file(
        &self,
        record: &FileRecord,
        stage: &str,
        error: &str,
    ) -> Result<(), EngineError> {
        if record.state == FileState::Untracked {
            let outcome = self
                .submit(&record.path, IngestEvent::StartUpload, TransitionPayload::default())
                .await?;
            if outcome != TransitionOutcome::Success {
                return Ok(());
            }
        }
        let event = match record.state {
            FileState::Untracked | FileState::Uploading => IngestEvent::FailUpload,
            FileState::Processing => IngestEvent::FailProcessing,
            FileState::Indexed | FileState::Failed => return Ok(()),
        };
        self.submit(&record.path, event, TransitionPayload::failure(stage, error)).await?;
        Ok(())
    }

    /// Submit through the transition manager and record the outcome.
    async fn submit(
        &self,
        path: &str,
        event: IngestEvent,
        payload: TransitionPayload,
    ) -> Result<TransitionOutcome, EngineError> {
        let outcome = self.manager.transition(path, event, payload).await?;
        match outcome {
            TransitionOutcome::Success => {
                self.breaker.record(true);
                self.limiter.on_success();
                let mut report = self.report.lock();
                report.transitions += 1;
                match event.target() {
                    FileState::Indexed => report.indexed += 1,
                    FileState::Failed => report.failed += 1,
                    _ => {}
                }
                drop(report);
                self.shared.lock().retries.remove(path);
            }
            TransitionOutcome::RejectedStale | TransitionOutcome::RejectedGuard => {
                tracing::debug!(path, %event, %outcome, "transition not applied");
            }
            TransitionOutcome::FailedPrecommit => {
                self.breaker.record(false);
            }
            TransitionOutcome::FailedPostcommit => {
                self.shared.lock().postcommit.insert(path.to_string());
            }
        }
        Ok(outcome)
    }

    /// Credit exhausted: flush a checkpoint, notify, stop claiming.
    fn pause_for_credits(&self) -> Result<(), EngineError> {
        let counts = self.store.ingest_counts()?;
        let marker = CheckpointMarker::from_counts(
            "credit_exhausted",
            &counts,
            self.clock.rfc3339(),
        );
        marker.write(&CheckpointMarker::path_for(self.store.path()))?;
        self.emit_error_event("index service credits exhausted; run resumes from checkpoint");
        self.report.lock().credit_paused = true;
        self.cancel.cancel();
        tracing::warn!(
            remaining = marker.remaining,
            "credits exhausted; pool paused cleanly"
        );
        Ok(())
    }

    fn emit_error_event(&self, message: &str) {
        if let Some(session_id) = &self.config.session_id {
            let payload = serde_json::json!({ "message": message });
            if let Err(err) =
                self.store
                    .append_event(session_id, EventType::Error, &payload, &self.clock.rfc3339())
            {
                tracing::warn!(error = %err, "failed to emit session error event");
            }
        }
    }
}

fn stage_for(state: FileState) -> &'static str {
    match state {
        FileState::Processing => "processing",
        _ => "upload",
    }
}

fn fail_event_for(state: FileState) -> IngestEvent {
    match state {
        FileState::Processing => IngestEvent::FailProcessing,
        _ => IngestEvent::FailUpload,
    }
}

/// Rough token estimate for the rate limiter's token bucket.
fn upload_token_estimate(path: &str) -> u32 {
    std::fs::metadata(path)
        .map(|meta| (meta.len() / 4).clamp(100, 200_000) as u32)
        .unwrap_or(1_000)
}

fn metadata_json(record: &FileRecord) -> serde_json::Value {
    let meta: serde_json::Value =
        serde_json::from_str(&record.meta_json).unwrap_or(serde_json::Value::Null);
    let enrichment: Option<serde_json::Value> = record
        .enrichment_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok());
    serde_json::json!({
        "scan": meta,
        "enrichment": enrichment,
        "content_hash": record.content_hash,
    })
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
