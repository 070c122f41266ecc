// SPDX-License-Identifier: MIT

//! Ingestion pipeline specs: OCC under contention, commit-boundary faults,
//! credit exhaustion, idempotence.

use crate::specs::prelude::*;

#[tokio::test]
async fn same_file_adversarial_has_exactly_one_winner() {
    let world = SpecWorld::with_files(1);
    let path = world.only_path();
    let manager = world.manager();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let manager = Arc::clone(&manager);
        let path = path.clone();
        tasks.push(tokio::spawn(async move {
            manager
                .transition(&path, IngestEvent::StartUpload, TransitionPayload::default())
                .await
                .unwrap()
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for task in tasks {
        match task.await.unwrap() {
            TransitionOutcome::Success => successes += 1,
            TransitionOutcome::RejectedStale | TransitionOutcome::RejectedGuard => rejections += 1,
            other => panic!("unexpected outcome {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(rejections, 9);

    let (state, version) = world.store.read_state(&path).unwrap();
    assert_eq!(state, FileState::Uploading);
    assert_eq!(version, 1);
    world.assert_invariants();
}

#[tokio::test]
async fn repeat_start_upload_after_success_never_wins_twice() {
    let world = SpecWorld::with_files(1);
    let path = world.only_path();
    let manager = world.manager();

    let first = manager
        .transition(&path, IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    assert_eq!(first, TransitionOutcome::Success);

    let second = manager
        .transition(&path, IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    assert!(matches!(
        second,
        TransitionOutcome::RejectedGuard | TransitionOutcome::RejectedStale
    ));
}

#[tokio::test]
async fn pre_commit_fault_leaves_file_untracked() {
    let world = SpecWorld::with_files(1);
    let path = world.only_path();
    let manager = world.manager();
    manager.faults().arm_pre_commit("injected raise before commit");

    let outcome = manager
        .transition(&path, IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::FailedPrecommit);

    let record = world.store.get_file(&path).unwrap();
    assert_eq!(record.state, FileState::Untracked);
    assert_eq!(record.version, 0);
    assert!(record.remote_file_id.is_none());
    world.assert_invariants();
}

#[tokio::test]
async fn post_commit_fault_advances_then_next_tick_fails_the_row() {
    let world = SpecWorld::with_files(1);
    let path = world.only_path();
    let manager = world.manager();
    manager.faults().arm_post_commit("injected raise after commit");

    // The pool's first tick hits the post-commit fault on start_upload; the
    // row is left at (uploading, v1). Its next tick drives the row to
    // failed with the post_commit_entry stage.
    let pool = world.pool(Arc::clone(&manager), PoolConfig::default());
    pool.run().await.unwrap();

    let record = world.store.get_file(&path).unwrap();
    assert_eq!(record.state, FileState::Failed);
    assert_eq!(record.failure_stage.as_deref(), Some("post_commit_entry"));
    assert!(record.last_error.is_some());
    world.assert_invariants();
}

#[tokio::test]
async fn credit_exhaustion_mid_batch_checkpoints_and_resumes_cleanly() {
    let world = SpecWorld::with_files(100);
    world.mock.exhaust_credits_after(50);

    let report = world
        .pool(world.manager(), PoolConfig::default())
        .run()
        .await
        .unwrap();
    assert!(report.credit_paused);

    let marker_path = CheckpointMarker::path_for(world.store.path());
    let marker = CheckpointMarker::read(&marker_path).unwrap().unwrap();
    assert_eq!(marker.reason, "credit_exhausted");
    assert!(marker.remaining >= 50);

    // Restart with credits restored: everything completes, the first 50
    // contents are not uploaded a second time.
    world.mock.exhaust_credits_after(usize::MAX);
    let report = world
        .pool(world.manager(), PoolConfig::default())
        .run()
        .await
        .unwrap();
    assert!(!report.credit_paused);

    let counts = world.store.ingest_counts().unwrap();
    assert_eq!(counts.indexed, 100);
    assert_eq!(counts.failed, 0);
    assert_eq!(world.mock.upload_count(), 100);
    assert!(CheckpointMarker::read(&marker_path).unwrap().is_none());
    world.assert_invariants();
}

#[tokio::test]
async fn scan_twice_upload_once_is_idempotent() {
    let world = SpecWorld::with_files(5);

    // Second scan before ingestion: no new rows.
    let report = Scanner::new(world.dir.path().join("corpus"))
        .scan(&world.store, &world.clock)
        .unwrap();
    assert_eq!(report.discovered, 0);
    assert_eq!(report.unchanged, 5);

    let report = world
        .pool(world.manager(), PoolConfig::default())
        .run()
        .await
        .unwrap();
    assert_eq!(report.indexed, 5);

    // Backfill over a finished corpus does nothing.
    let report = world
        .pool(world.manager(), PoolConfig::default())
        .run()
        .await
        .unwrap();
    assert_eq!(report.transitions, 0);
    assert_eq!(world.mock.upload_count(), 5);

    // And a rescan still changes nothing.
    let report = Scanner::new(world.dir.path().join("corpus"))
        .scan(&world.store, &world.clock)
        .unwrap();
    assert_eq!(report.unchanged, 5);
    world.assert_invariants();
}

#[tokio::test]
async fn remote_indexing_failure_is_attributed_to_processing() {
    let world = SpecWorld::with_files(1);
    let path = world.only_path();
    let manager = world.manager();

    // Drive through upload by hand, then let the remote report failure.
    manager
        .transition(&path, IngestEvent::StartUpload, TransitionPayload::default())
        .await
        .unwrap();
    manager
        .transition(
            &path,
            IngestEvent::UploadComplete,
            TransitionPayload::uploaded("files/abc", "stores/corpus"),
        )
        .await
        .unwrap();
    let outcome = manager
        .transition(
            &path,
            IngestEvent::FailProcessing,
            TransitionPayload::failure("processing", "indexing aborted by service"),
        )
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::Success);

    let record = world.store.get_file(&path).unwrap();
    assert_eq!(record.state, FileState::Failed);
    assert_eq!(record.failure_stage.as_deref(), Some("processing"));
    // Remote ids from the completed upload survive the failure.
    assert_eq!(record.remote_file_id.as_deref(), Some("files/abc"));
    world.assert_invariants();
}
