// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! carrel-adapters: the boundary to the external index and ranking services.
//!
//! The core depends on two traits; concrete implementations are chosen at
//! process start. `RemoteIndex` speaks HTTP with bounded jittered retries and
//! classifies wire failures into the transport-agnostic taxonomy. `MockIndex`
//! (behind `test-support`) drives the adversarial harness with configurable
//! latency profiles and a fixed random seed.

mod error;
mod index;
mod model;
mod remote;

#[cfg(any(test, feature = "test-support"))]
mod mock;

pub use error::AdapterError;
pub use index::{GroundingChunk, IndexAdapter, PollStatus, QueryFilters, UploadTicket};
#[cfg(any(test, feature = "test-support"))]
pub use mock::{LatencyProfile, MockIndex};
pub use model::{Citation, Claim, ModelAdapter, Synthesis, SynthesisRequest};
pub use remote::{RemoteConfig, RemoteIndex};
