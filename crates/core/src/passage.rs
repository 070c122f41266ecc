// SPDX-License-Identifier: MIT

//! Deterministic passage identity.
//!
//! Citations reference passages by an identifier derived from
//! `(file_id, sha256(passage_text))`, so session replay stays stable across
//! re-indexing: the same text from the same file always yields the same id.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Fixed namespace for passage UUIDs. Changing this invalidates every stored
/// citation, so it never changes.
const PASSAGE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1a, 0x2f, 0x4c, 0x9d, 0x3e, 0x45, 0x18, 0x8a, 0x07, 0xc2, 0x5f, 0x91, 0x6d, 0x30,
    0xb4,
]);

/// Hex sha-256 of the passage text.
pub fn passage_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex_string(&hasher.finalize())
}

/// Deterministic UUID for a `(file_id, passage_text)` pair.
pub fn passage_id(file_id: &str, text: &str) -> Uuid {
    let name = format!("{}\n{}", file_id, passage_hash(text));
    Uuid::new_v5(&PASSAGE_NAMESPACE, name.as_bytes())
}

/// Hex sha-256 of arbitrary bytes (file content hashing shares this).
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_string(&hasher.finalize())
}

fn hex_string(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[cfg(test)]
#[path = "passage_tests.rs"]
mod tests;
