// SPDX-License-Identifier: MIT

use super::*;

const NOW: &str = "2026-01-01T00:00:00+00:00";
const LATER: &str = "2026-01-02T00:00:00+00:00";

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("carrel.db")).unwrap();
    (dir, store)
}

#[test]
fn touch_twice_yields_same_id_and_one_row() {
    let (_dir, store) = temp_store();
    let first = store.touch_passage("files/abc", "a passage of text", NOW).unwrap();
    let second = store.touch_passage("files/abc", "a passage of text", LATER).unwrap();
    assert_eq!(first, second);

    let record = store.get_passage(&first).unwrap().unwrap();
    assert_eq!(record.created_at, NOW);
    assert_eq!(record.last_seen_at, LATER);
    assert!(!record.stale);
}

#[test]
fn different_text_gets_its_own_row() {
    let (_dir, store) = temp_store();
    let a = store.touch_passage("files/abc", "first passage", NOW).unwrap();
    let b = store.touch_passage("files/abc", "second passage", NOW).unwrap();
    assert_ne!(a, b);
}

#[test]
fn stale_rows_survive_and_revive_on_touch() {
    let (_dir, store) = temp_store();
    let id = store.touch_passage("files/abc", "a passage", NOW).unwrap();

    assert_eq!(store.mark_passages_stale("files/abc").unwrap(), 1);
    let record = store.get_passage(&id).unwrap().unwrap();
    assert!(record.stale);
    // Preserved for replay: text still resolvable.
    assert_eq!(record.passage_text, "a passage");

    store.touch_passage("files/abc", "a passage", LATER).unwrap();
    let record = store.get_passage(&id).unwrap().unwrap();
    assert!(!record.stale);
}

#[test]
fn unknown_passage_is_none() {
    let (_dir, store) = temp_store();
    assert!(store.get_passage("no-such-id").unwrap().is_none());
}
