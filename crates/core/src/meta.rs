// SPDX-License-Identifier: MIT

//! Scanner-derived corpus metadata.
//!
//! The scanner fills this from directory conventions; the search pipeline
//! reads it back for filtering, diversification, and learn-mode ordering.
//! External enrichers attach their own JSON blob separately and opaquely.

use serde::{Deserialize, Serialize};

/// Metadata derived from a file's position in the corpus tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusMeta {
    /// Top-level directory, e.g. "lectures" or "essays"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Second-level grouping, e.g. a course or anthology name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    /// Series name parsed from a "NN - Title" filename prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    /// Episode number parsed from the filename prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Difficulty bucket for learn-mode ordering (0 = introductory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u8>,
}

impl CorpusMeta {
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Map a category to its difficulty bucket.
///
/// Introductory material sorts first in learn mode; unknown categories land
/// in the middle so they neither lead nor trail.
pub fn difficulty_bucket(category: &str) -> u8 {
    match category {
        "introductions" | "overviews" => 0,
        "essays" | "lectures" => 1,
        "courses" => 2,
        "seminars" | "workshops" => 3,
        _ => 2,
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
