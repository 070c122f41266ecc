// SPDX-License-Identifier: MIT

//! The transition manager: every state change flows through here.
//!
//! Acquires the per-file lock, reads fresh (state, version), instantiates an
//! ephemeral FSM, and lets the entry hook perform the guarded OCC write.
//! The WHERE clause carries both prior state and prior version, so among N
//! concurrent attempts on the same row exactly one commits; the rest see
//! rowcount 0 and come back `RejectedStale`.

use crate::error::EngineError;
use crate::locks::LockManager;
use carrel_core::{
    Clock, Edge, EntryError, FsmError, GuardError, IngestEvent, LifecycleFsm, TransitionCtx,
    TransitionHooks, TransitionPayload,
};
use carrel_store::{GuardedUpdate, Store, StoreError};
use parking_lot::Mutex;
#[cfg(any(test, feature = "test-support"))]
use std::sync::Arc;

/// Classified result of one transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The guarded UPDATE committed; the row advanced.
    Success,
    /// OCC rowcount was 0: another worker got there first.
    RejectedStale,
    /// The event is illegal from the current state, or a guard raised.
    RejectedGuard,
    /// Failure before commit; the row is unchanged.
    FailedPrecommit,
    /// Failure after commit; the row advanced but a side effect was lost.
    FailedPostcommit,
}

carrel_core::simple_display! {
    TransitionOutcome {
        Success => "success",
        RejectedStale => "rejected_stale",
        RejectedGuard => "rejected_guard",
        FailedPrecommit => "failed_precommit",
        FailedPostcommit => "failed_postcommit",
    }
}

/// Test-only fault injection at the commit boundary.
///
/// Each armed fault fires exactly once. Pre-commit faults rise before the
/// guarded UPDATE runs; post-commit faults rise after it committed.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FaultInjector {
    pre_commit: Mutex<Option<String>>,
    post_commit: Mutex<Option<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FaultInjector {
    pub fn arm_pre_commit(&self, message: impl Into<String>) {
        *self.pre_commit.lock() = Some(message.into());
    }

    pub fn arm_post_commit(&self, message: impl Into<String>) {
        *self.post_commit.lock() = Some(message.into());
    }

    fn take_pre_commit(&self) -> Option<String> {
        self.pre_commit.lock().take()
    }

    fn take_post_commit(&self) -> Option<String> {
        self.post_commit.lock().take()
    }
}

/// Hooks backing the FSM callbacks with the durable store.
struct StoreHooks<C: Clock> {
    store: Store,
    clock: C,
    /// Store errors that must not be swallowed into an outcome class
    /// (integrity violations crash-fail the worker).
    fatal: Mutex<Option<StoreError>>,
    #[cfg(any(test, feature = "test-support"))]
    faults: Arc<FaultInjector>,
}

#[async_trait::async_trait]
impl<C: Clock> TransitionHooks for StoreHooks<C> {
    async fn guard(&self, edge: Edge, ctx: &TransitionCtx) -> Result<(), GuardError> {
        // Read-only eligibility check against the live row. The entry hook's
        // OCC clause is the authority; this keeps obviously-stale attempts
        // from reaching the write path.
        let (state, _) = self
            .store
            .read_state(&ctx.path)
            .map_err(|e| GuardError(e.to_string()))?;
        if state != edge.from {
            return Err(GuardError(format!(
                "row moved to {state} while preparing {}",
                edge.event
            )));
        }
        Ok(())
    }

    async fn enter(&self, edge: Edge, ctx: Option<&TransitionCtx>) -> Result<(), EntryError> {
        // Initial-state activation carries no context and writes nothing.
        let Some(ctx) = ctx else {
            return Ok(());
        };

        #[cfg(any(test, feature = "test-support"))]
        if let Some(message) = self.faults.take_pre_commit() {
            return Err(EntryError::PreCommit(message));
        }

        let update = GuardedUpdate {
            path: &ctx.path,
            expected_state: edge.from,
            expected_version: ctx.expected_version,
            new_state: edge.to,
            payload: &ctx.payload,
            now: &self.clock.rfc3339(),
        };
        let rows = match self.store.guarded_update(&update) {
            Ok(rows) => rows,
            Err(err) => {
                let message = err.to_string();
                if matches!(err.failure_kind(), carrel_core::FailureKind::IntegrityViolation) {
                    *self.fatal.lock() = Some(err);
                }
                return Err(EntryError::PreCommit(message));
            }
        };
        if rows == 0 {
            return Err(EntryError::Stale);
        }

        #[cfg(any(test, feature = "test-support"))]
        if let Some(message) = self.faults.take_post_commit() {
            return Err(EntryError::PostCommit(message));
        }

        Ok(())
    }
}

/// Serialized, OCC-guarded access to file lifecycle transitions.
pub struct TransitionManager<C: Clock> {
    store: Store,
    clock: C,
    locks: LockManager,
    #[cfg(any(test, feature = "test-support"))]
    faults: Arc<FaultInjector>,
}

impl<C: Clock> TransitionManager<C> {
    pub fn new(store: Store, clock: C) -> Self {
        Self {
            store,
            clock,
            locks: LockManager::new(),
            #[cfg(any(test, feature = "test-support"))]
            faults: Arc::new(FaultInjector::default()),
        }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn faults(&self) -> Arc<FaultInjector> {
        Arc::clone(&self.faults)
    }

    /// Drive one event for one file.
    ///
    /// Holds the per-file lock for the whole attempt, reads (state, version)
    /// fresh, and maps FSM callback failures to outcome classes. Only
    /// integrity violations propagate as errors; everything else is a
    /// classified outcome the worker loop can act on.
    pub async fn transition(
        &self,
        path: &str,
        event: IngestEvent,
        payload: TransitionPayload,
    ) -> Result<TransitionOutcome, EngineError> {
        let _guard = self.locks.acquire(path).await;

        let (state, version) = match self.store.read_state(path) {
            Ok(read) => read,
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(path, %event, "transition on unknown or superseded row");
                return Ok(TransitionOutcome::RejectedGuard);
            }
            Err(err) => return Err(err.into()),
        };

        if !event.allowed_from(state) {
            tracing::debug!(path, %event, %state, "event not allowed");
            return Ok(TransitionOutcome::RejectedGuard);
        }

        let hooks = StoreHooks {
            store: self.store.clone(),
            clock: self.clock.clone(),
            fatal: Mutex::new(None),
            #[cfg(any(test, feature = "test-support"))]
            faults: Arc::clone(&self.faults),
        };

        // Fresh ephemeral FSM per transition; its in-memory state is a
        // cache of the read above, never the authority.
        let mut fsm = LifecycleFsm::new(state);
        fsm.activate(&hooks).await.map_err(|e| {
            EngineError::InvalidConfig(format!("initial-state activation failed: {e}"))
        })?;

        let ctx = TransitionCtx {
            path: path.to_string(),
            expected_version: version,
            payload,
        };
        let outcome = match fsm.trigger(event, &hooks, &ctx).await {
            Ok(new_state) => {
                tracing::info!(path, %event, from = %state, to = %new_state, version = version + 1, "transition committed");
                TransitionOutcome::Success
            }
            Err(FsmError::EventNotAllowed { .. }) => TransitionOutcome::RejectedGuard,
            Err(FsmError::Guard(reason)) => {
                tracing::debug!(path, %event, %reason, "guard rejected");
                TransitionOutcome::RejectedGuard
            }
            Err(FsmError::Entry(EntryError::Stale)) => {
                tracing::debug!(path, %event, "rejected stale");
                TransitionOutcome::RejectedStale
            }
            Err(FsmError::Entry(EntryError::PreCommit(reason))) => {
                if let Some(fatal) = hooks.fatal.lock().take() {
                    return Err(fatal.into());
                }
                tracing::warn!(path, %event, %reason, "failed before commit");
                TransitionOutcome::FailedPrecommit
            }
            Err(FsmError::Entry(EntryError::PostCommit(reason))) => {
                tracing::warn!(path, %event, %reason, "failed after commit; row advanced");
                TransitionOutcome::FailedPostcommit
            }
            Err(FsmError::NotActivated) => {
                return Err(EngineError::InvalidConfig(
                    "fsm triggered before activation".to_string(),
                ));
            }
        };
        Ok(outcome)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
