// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! carrel-store: durable SQLite state store.
//!
//! Single source of truth for file lifecycle state, passages, sessions, and
//! the session event log. WAL mode, per-operation connections, and a bounded
//! busy-retry on every write path.

mod db;
mod error;
mod files;
mod passages;
mod retry;
mod sessions;

pub use db::Store;
pub use error::StoreError;
pub use files::{GuardedUpdate, IngestCounts, ScanUpsert, UpsertOutcome};
