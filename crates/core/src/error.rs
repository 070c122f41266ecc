// SPDX-License-Identifier: MIT

//! Transport-agnostic failure taxonomy.
//!
//! Adapters classify their wire-level failures into these kinds; the worker
//! pool decides what each kind means for the file being driven (retry, pause,
//! fail) without ever seeing HTTP status codes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classified failure from an external call or a guarded store write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureKind {
    /// Timeout, 5xx, transient lock contention. Retry with backoff.
    Transient,
    /// 429. Respect retry-after, shrink the limiter, re-queue.
    RateLimit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },
    /// Payment required. Checkpoint, pause the pool, exit cleanly.
    CreditExhausted,
    /// Permanent 4xx or content rejection. Drive the file to failed.
    Reject,
    /// OCC rowcount was zero: another worker advanced the row first.
    GuardStale,
    /// Foreign-key or check-constraint failure. Data corruption; crash-fail.
    IntegrityViolation,
}

impl FailureKind {
    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        FailureKind::RateLimit {
            retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FailureKind::RateLimit { retry_after_ms } => {
                retry_after_ms.map(Duration::from_millis)
            }
            _ => None,
        }
    }

    /// Whether the worker should try the same file again without failing it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient | FailureKind::RateLimit { .. })
    }
}

crate::simple_display! {
    FailureKind {
        Transient => "transient",
        RateLimit { .. } => "rate_limit",
        CreditExhausted => "credit_exhausted",
        Reject => "reject",
        GuardStale => "guard_stale",
        IntegrityViolation => "integrity_violation",
    }
}
