// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! carrel-search: the read path.
//!
//! Expand → retrieve → rerank → diversify → synthesize → validate, each
//! stage skippable and independently degradable, with session events as the
//! audit trail.

mod diversify;
mod error;
mod glossary;
mod normalize;
mod pipeline;
mod session;

pub use diversify::diversify;
pub use error::SearchError;
pub use glossary::{Expansion, Glossary};
pub use normalize::{normalize, validate_claims, ClaimFailure};
pub use pipeline::{
    RankedPassage, SearchMode, SearchPipeline, SearchRequest, SearchResponse,
};
pub use session::ActiveSession;
