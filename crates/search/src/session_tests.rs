// SPDX-License-Identifier: MIT

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn marker_file_round_trip() {
    std::env::remove_var(ActiveSession::ENV);
    let dir = tempfile::tempdir().unwrap();
    let active = ActiveSession::new(dir.path());

    assert_eq!(active.current(), None);
    active.set("session-123").unwrap();
    assert_eq!(active.current().as_deref(), Some("session-123"));

    active.clear().unwrap();
    assert_eq!(active.current(), None);
    // Clearing twice is fine.
    active.clear().unwrap();
}

#[test]
#[serial]
fn environment_overrides_marker() {
    let dir = tempfile::tempdir().unwrap();
    let active = ActiveSession::new(dir.path());
    active.set("from-file").unwrap();

    std::env::set_var(ActiveSession::ENV, "from-env");
    assert_eq!(active.current().as_deref(), Some("from-env"));
    std::env::remove_var(ActiveSession::ENV);

    assert_eq!(active.current().as_deref(), Some("from-file"));
}

#[test]
#[serial]
fn empty_values_count_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let active = ActiveSession::new(dir.path());

    std::env::set_var(ActiveSession::ENV, "  ");
    assert_eq!(active.current(), None);
    std::env::remove_var(ActiveSession::ENV);

    active.set("").unwrap();
    assert_eq!(active.current(), None);
}
