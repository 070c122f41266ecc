// SPDX-License-Identifier: MIT

//! Citation validation.
//!
//! Quotes come back from the model with mangled typography: curly quotes,
//! em-dashes for hyphens, case drift, reflowed whitespace. Validation
//! normalizes both sides and requires the quote to be a substring of the
//! stored passage; anything else is a fabrication and the claim is dropped.

use carrel_adapters::Claim;
use std::collections::HashMap;

/// Canonical form for substring comparison: whitespace collapsed to single
/// spaces, Unicode quotes folded to ASCII, the whole dash family (hyphens
/// included) treated as a separator, case-folded. Treating hyphens as
/// separators is what lets "measurement omission" match
/// "measurement-omission".
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        let mapped = match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' => ' ',
            other => other,
        };
        if mapped.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }
        last_was_space = false;
        for lower in mapped.to_lowercase() {
            out.push(lower);
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// One rejected claim, with enough detail to name it in a re-prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimFailure {
    pub claim_index: usize,
    pub passage_id: String,
    pub reason: String,
}

impl ClaimFailure {
    /// Feedback line for the corrective re-prompt.
    pub fn describe(&self) -> String {
        format!(
            "claim {}: quote not found in passage {} ({})",
            self.claim_index + 1,
            self.passage_id,
            self.reason
        )
    }
}

/// Split claims into validated and failed against the passage texts.
///
/// `passages` maps passage id → stored passage text. Validation is the
/// normalized-substring check; a missing passage id is a failure, not a
/// pass.
pub fn validate_claims(
    claims: &[Claim],
    passages: &HashMap<String, String>,
) -> (Vec<Claim>, Vec<ClaimFailure>) {
    let mut valid = Vec::new();
    let mut failures = Vec::new();
    for (index, claim) in claims.iter().enumerate() {
        let Some(passage_text) = passages.get(&claim.citation.passage_id) else {
            failures.push(ClaimFailure {
                claim_index: index,
                passage_id: claim.citation.passage_id.clone(),
                reason: "unknown passage id".to_string(),
            });
            continue;
        };
        let quote = normalize(&claim.citation.quote);
        if quote.is_empty() {
            failures.push(ClaimFailure {
                claim_index: index,
                passage_id: claim.citation.passage_id.clone(),
                reason: "empty quote".to_string(),
            });
            continue;
        }
        if normalize(passage_text).contains(&quote) {
            valid.push(claim.clone());
        } else {
            failures.push(ClaimFailure {
                claim_index: index,
                passage_id: claim.citation.passage_id.clone(),
                reason: "quote is not a substring of the cited passage".to_string(),
            });
        }
    }
    (valid, failures)
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
