// SPDX-License-Identifier: MIT

//! Search pipeline errors.
//!
//! Only retrieval failure fails a request; every later stage degrades
//! (rerank keeps retrieval order, synthesis falls back to excerpts) and
//! surfaces a warning instead.

use carrel_adapters::AdapterError;
use carrel_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("retrieval failed: {0}")]
    Retrieve(#[source] AdapterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("glossary unreadable: {0}")]
    Glossary(String),
}
