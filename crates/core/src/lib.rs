// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! carrel-core: lifecycle model shared by the ingest and search pipelines

pub mod macros;

pub mod clock;
pub mod error;
pub mod fsm;
pub mod meta;
pub mod passage;
pub mod record;
pub mod state;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use error::FailureKind;
pub use fsm::{Edge, EntryError, FsmError, GuardError, LifecycleFsm, TransitionCtx, TransitionHooks};
pub use meta::{difficulty_bucket, CorpusMeta};
pub use passage::{content_hash, passage_hash, passage_id};
pub use record::{
    EventType, FileRecord, PassageRecord, SessionEventRecord, SessionRecord, TransitionPayload,
};
#[cfg(any(test, feature = "test-support"))]
pub use record::FileRecordBuilder;
pub use state::{FileState, IngestEvent};
