// SPDX-License-Identifier: MIT

//! Engine errors.

use carrel_adapters::AdapterError;
use carrel_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("scan failed: {0}")]
    Scan(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("checkpoint marker unreadable: {0}")]
    Checkpoint(String),

    /// The circuit breaker halted the pool.
    #[error("worker pool halted: {0}")]
    Halted(String),
}
