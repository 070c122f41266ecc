// SPDX-License-Identifier: MIT

//! Curated synonym glossary and query expansion.
//!
//! The glossary is a YAML document with a top-level `terms` sequence; each
//! entry has a `term` and its `synonyms`. Matching is case-insensitive,
//! word-boundary-aware, and longest-phrase-first so "conceptual common
//! denominator" wins over "concept". Expansion boosts matched terms by
//! duplicating them and appends at most two synonyms per match; a query
//! with no matches expands to itself, unchanged.

use crate::error::SearchError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_SYNONYMS_PER_TERM: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TermEntry {
    term: String,
    #[serde(default)]
    synonyms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GlossaryDoc {
    terms: Vec<TermEntry>,
}

/// Result of expanding one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub expanded: String,
    /// Terms that matched, in query order
    pub matched: Vec<String>,
}

struct CompiledTerm {
    term: String,
    synonyms: Vec<String>,
    pattern: Regex,
}

/// Loaded glossary with compiled matchers.
pub struct Glossary {
    terms: Vec<CompiledTerm>,
}

impl Glossary {
    pub fn load(path: &Path) -> Result<Self, SearchError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SearchError::Glossary(format!("{}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn parse(yaml: &str) -> Result<Self, SearchError> {
        let doc: GlossaryDoc =
            serde_yaml::from_str(yaml).map_err(|e| SearchError::Glossary(e.to_string()))?;
        let mut entries = doc.terms;
        // Longest phrase first: more words, then more characters.
        entries.sort_by(|a, b| {
            let words = b.term.split_whitespace().count().cmp(&a.term.split_whitespace().count());
            words.then(b.term.len().cmp(&a.term.len()))
        });

        let mut terms = Vec::with_capacity(entries.len());
        for entry in entries {
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&entry.term)))
                .map_err(|e| SearchError::Glossary(e.to_string()))?;
            terms.push(CompiledTerm {
                term: entry.term,
                synonyms: entry.synonyms,
                pattern,
            });
        }
        Ok(Self { terms })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Expand a query against the glossary.
    pub fn expand(&self, query: &str) -> Expansion {
        // Claimed byte spans prevent a shorter term from re-matching inside
        // a longer phrase that already won.
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut matches: Vec<(usize, &CompiledTerm)> = Vec::new();

        for term in &self.terms {
            for found in term.pattern.find_iter(query) {
                let span = (found.start(), found.end());
                let overlaps = claimed
                    .iter()
                    .any(|(start, end)| span.0 < *end && *start < span.1);
                if overlaps {
                    continue;
                }
                claimed.push(span);
                matches.push((span.0, term));
                break; // one boost per glossary term
            }
        }
        if matches.is_empty() {
            return Expansion {
                expanded: query.to_string(),
                matched: Vec::new(),
            };
        }
        matches.sort_by_key(|(start, _)| *start);

        let mut expanded = query.to_string();
        let mut matched = Vec::new();
        for (_, term) in matches {
            expanded.push(' ');
            expanded.push_str(&term.term);
            for synonym in term.synonyms.iter().take(MAX_SYNONYMS_PER_TERM) {
                expanded.push(' ');
                expanded.push_str(synonym);
            }
            matched.push(term.term.clone());
        }
        Expansion { expanded, matched }
    }
}

#[cfg(test)]
#[path = "glossary_tests.rs"]
mod tests;
