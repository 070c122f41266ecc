// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn identical_inputs_yield_identical_ids() {
    let a = passage_id("files/abc123", "Concepts are formed by measurement-omission.");
    let b = passage_id("files/abc123", "Concepts are formed by measurement-omission.");
    assert_eq!(a, b);
}

#[test]
fn different_file_same_text_differs() {
    let a = passage_id("files/abc123", "the same passage");
    let b = passage_id("files/def456", "the same passage");
    assert_ne!(a, b);
}

#[test]
fn different_text_same_file_differs() {
    let a = passage_id("files/abc123", "first passage");
    let b = passage_id("files/abc123", "second passage");
    assert_ne!(a, b);
}

#[test]
fn passage_hash_is_sha256_hex() {
    let hash = passage_hash("");
    // sha-256 of the empty string
    assert_eq!(
        hash,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn content_hash_matches_passage_hash_for_utf8() {
    assert_eq!(content_hash("hello".as_bytes()), passage_hash("hello"));
}
