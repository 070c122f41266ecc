// SPDX-License-Identifier: MIT

use super::*;
use carrel_core::{FakeClock, FileState};
use carrel_store::ScanUpsert;

fn seed_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("carrel.db")).unwrap();
    store
        .discover_or_update(&ScanUpsert {
            path: "/corpus/a.txt".into(),
            content_hash: "h1".into(),
            mtime_ms: 0,
            meta_json: "{}".into(),
            now: "2026-01-01T00:00:00+00:00".into(),
        })
        .unwrap();
    (dir, store)
}

fn manager(store: &Store) -> TransitionManager<FakeClock> {
    TransitionManager::new(store.clone(), FakeClock::new())
}

#[tokio::test]
async fn success_advances_state_and_version() {
    let (_dir, store) = seed_store();
    let manager = manager(&store);

    let outcome = manager
        .transition("/corpus/a.txt", IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::Success);

    let (state, version) = store.read_state("/corpus/a.txt").unwrap();
    assert_eq!(state, FileState::Uploading);
    assert_eq!(version, 1);
}

#[tokio::test]
async fn second_start_upload_is_rejected_not_doubled() {
    let (_dir, store) = seed_store();
    let manager = manager(&store);

    manager
        .transition("/corpus/a.txt", IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    let outcome = manager
        .transition("/corpus/a.txt", IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::RejectedGuard);

    let (_, version) = store.read_state("/corpus/a.txt").unwrap();
    assert_eq!(version, 1);
}

#[tokio::test]
async fn unknown_path_is_rejected_guard() {
    let (_dir, store) = seed_store();
    let manager = manager(&store);
    let outcome = manager
        .transition("/corpus/missing.txt", IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::RejectedGuard);
}

#[tokio::test]
async fn pre_commit_fault_leaves_row_untouched() {
    let (_dir, store) = seed_store();
    let manager = manager(&store);
    manager.faults().arm_pre_commit("injected before commit");

    let outcome = manager
        .transition("/corpus/a.txt", IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::FailedPrecommit);

    let (state, version) = store.read_state("/corpus/a.txt").unwrap();
    assert_eq!(state, FileState::Untracked);
    assert_eq!(version, 0);
    assert!(store.get_file("/corpus/a.txt").unwrap().remote_file_id.is_none());
}

#[tokio::test]
async fn post_commit_fault_reports_but_row_advanced() {
    let (_dir, store) = seed_store();
    let manager = manager(&store);
    manager.faults().arm_post_commit("injected after commit");

    let outcome = manager
        .transition("/corpus/a.txt", IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::FailedPostcommit);

    let (state, version) = store.read_state("/corpus/a.txt").unwrap();
    assert_eq!(state, FileState::Uploading);
    assert_eq!(version, 1);
}

#[tokio::test]
async fn concurrent_attempts_have_exactly_one_winner() {
    let (_dir, store) = seed_store();
    let manager = std::sync::Arc::new(manager(&store));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let manager = std::sync::Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            manager
                .transition("/corpus/a.txt", IngestEvent::StartUpload, TransitionPayload::default())
                .await
                .unwrap()
        }));
    }
    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() == TransitionOutcome::Success {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);

    let (state, version) = store.read_state("/corpus/a.txt").unwrap();
    assert_eq!(state, FileState::Uploading);
    assert_eq!(version, 1);
}

#[tokio::test]
async fn fail_event_records_diagnostics() {
    let (_dir, store) = seed_store();
    let manager = manager(&store);
    manager
        .transition("/corpus/a.txt", IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();

    let outcome = manager
        .transition(
            "/corpus/a.txt",
            IngestEvent::FailUpload,
            TransitionPayload::failure("upload", "remote rejected content"),
        )
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::Success);

    let record = store.get_file("/corpus/a.txt").unwrap();
    assert_eq!(record.state, FileState::Failed);
    assert_eq!(record.failure_stage.as_deref(), Some("upload"));
    assert_eq!(record.last_error.as_deref(), Some("remote rejected content"));
}
