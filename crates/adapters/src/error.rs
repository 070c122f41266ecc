// SPDX-License-Identifier: MIT

//! Adapter failures, already classified.
//!
//! Transports stay inside the adapter: callers never see an HTTP status,
//! only the class it maps to. Transient failures are retried inside the
//! adapter first and only escalate once attempts are exhausted.

use carrel_core::FailureKind;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// Timeout or 5xx after adapter-internal retries were exhausted.
    #[error("transient failure: {0}")]
    Transient(String),

    /// 429 from the service, with its advertised retry-after if any.
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Payment required / credits exhausted. Out-of-band action needed.
    #[error("credits exhausted")]
    CreditExhausted,

    /// Permanent rejection: 4xx, schema validation failure, content refused.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl AdapterError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AdapterError::Transient(_) => FailureKind::Transient,
            AdapterError::RateLimited { retry_after } => FailureKind::rate_limit(*retry_after),
            AdapterError::CreditExhausted => FailureKind::CreditExhausted,
            AdapterError::Rejected(_) => FailureKind::Reject,
        }
    }
}
