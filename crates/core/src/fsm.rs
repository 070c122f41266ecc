// SPDX-License-Identifier: MIT

//! Ephemeral lifecycle state machine.
//!
//! The FSM validates legal edges and sequences the guard and entry phases of
//! a transition. It is never the state owner: an instance is constructed
//! from a fresh store read, used for exactly one transition, and discarded.
//! The durable write happens inside the entry hook; after any store failure
//! the in-memory state is meaningless and callers re-read the store.

use crate::record::TransitionPayload;
use crate::state::{FileState, IngestEvent};
use async_trait::async_trait;
use thiserror::Error;

/// A legal (from, event, to) edge, resolved before any callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: FileState,
    pub event: IngestEvent,
    pub to: FileState,
}

/// Context for one transition: the file being driven, the version the caller
/// read, and event-specific payload fields.
#[derive(Debug, Clone)]
pub struct TransitionCtx {
    pub path: String,
    pub expected_version: i64,
    pub payload: TransitionPayload,
}

/// A guard raised: the transition is rejected without touching the store.
#[derive(Debug, Error)]
#[error("guard rejected: {0}")]
pub struct GuardError(pub String);

/// Failure from the state-entry hook, tagged with commit phase.
///
/// The hook owns the transaction, so only it knows whether the guarded
/// UPDATE committed before the failure rose.
#[derive(Debug, Error)]
pub enum EntryError {
    /// Guarded UPDATE matched zero rows: another worker advanced this row.
    #[error("stale transition: row no longer at expected (state, version)")]
    Stale,
    /// Raised before commit; the transaction rolled back, state unchanged.
    #[error("entry failed before commit: {0}")]
    PreCommit(String),
    /// Raised after commit; state advanced, diagnostic side effect lost.
    #[error("entry failed after commit: {0}")]
    PostCommit(String),
}

#[derive(Debug, Error)]
pub enum FsmError {
    #[error("event {event} not allowed from state {state}")]
    EventNotAllowed {
        state: FileState,
        event: IngestEvent,
    },
    #[error("initial state was not activated before trigger")]
    NotActivated,
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Entry(#[from] EntryError),
}

/// Per-transition callbacks. Guards are read-only predicates; the entry hook
/// performs the guarded store write.
#[async_trait]
pub trait TransitionHooks: Send + Sync {
    /// Async predicate; may read the store, must not mutate.
    async fn guard(&self, _edge: Edge, _ctx: &TransitionCtx) -> Result<(), GuardError> {
        Ok(())
    }

    /// State-entry hook: the durable write. Invoked with `None` context
    /// during initial-state activation, which must be a no-op.
    async fn enter(&self, edge: Edge, ctx: Option<&TransitionCtx>) -> Result<(), EntryError>;
}

/// One-shot FSM instance constructed from the current durable state.
#[derive(Debug)]
pub struct LifecycleFsm {
    state: FileState,
    activated: bool,
}

impl LifecycleFsm {
    pub fn new(state: FileState) -> Self {
        Self {
            state,
            activated: false,
        }
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    /// Explicitly activate the initial state.
    ///
    /// Invokes the entry hook with a null context and a self-edge; hooks
    /// treat the null context as a no-op, so activation never writes. The
    /// self-edge's event field is a placeholder the hook must not read.
    pub async fn activate<H: TransitionHooks>(&mut self, hooks: &H) -> Result<(), FsmError> {
        let edge = Edge {
            from: self.state,
            event: IngestEvent::StartUpload,
            to: self.state,
        };
        hooks.enter(edge, None).await?;
        self.activated = true;
        Ok(())
    }

    /// Drive one event through guard and entry phases.
    ///
    /// Errors from either phase propagate untouched; the caller maps them to
    /// transition outcomes. On success the in-memory state advances, but the
    /// store remains the only authority.
    pub async fn trigger<H: TransitionHooks>(
        &mut self,
        event: IngestEvent,
        hooks: &H,
        ctx: &TransitionCtx,
    ) -> Result<FileState, FsmError> {
        if !self.activated {
            return Err(FsmError::NotActivated);
        }
        if !event.allowed_from(self.state) {
            return Err(FsmError::EventNotAllowed {
                state: self.state,
                event,
            });
        }
        let edge = Edge {
            from: self.state,
            event,
            to: event.target(),
        };
        hooks.guard(edge, ctx).await?;
        hooks.enter(edge, Some(ctx)).await?;
        self.state = edge.to;
        Ok(self.state)
    }
}

#[cfg(test)]
#[path = "fsm_tests.rs"]
mod tests;
