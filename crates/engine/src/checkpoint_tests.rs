// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn round_trip_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("carrel.db");
    let marker_path = CheckpointMarker::path_for(&db_path);

    assert!(CheckpointMarker::read(&marker_path).unwrap().is_none());

    let marker = CheckpointMarker {
        written_at: "2026-01-01T00:00:00+00:00".into(),
        reason: "credit_exhausted".into(),
        indexed: 50,
        failed: 0,
        remaining: 50,
    };
    marker.write(&marker_path).unwrap();

    let read = CheckpointMarker::read(&marker_path).unwrap().unwrap();
    assert_eq!(read, marker);

    CheckpointMarker::clear(&marker_path).unwrap();
    assert!(CheckpointMarker::read(&marker_path).unwrap().is_none());
    // Clearing a missing marker is fine.
    CheckpointMarker::clear(&marker_path).unwrap();
}

#[test]
fn marker_sits_beside_the_database() {
    let path = CheckpointMarker::path_for(std::path::Path::new("/data/carrel.db"));
    assert_eq!(path, std::path::Path::new("/data/carrel.db.checkpoint.json"));
}
