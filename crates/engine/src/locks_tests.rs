// SPDX-License-Identifier: MIT

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn same_path_serializes() {
    let manager = Arc::new(LockManager::new());
    let concurrent = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        let concurrent = Arc::clone(&concurrent);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            let _guard = manager.acquire("/corpus/a.txt").await;
            let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            concurrent.fetch_sub(1, Ordering::SeqCst);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_paths_run_concurrently() {
    let manager = Arc::new(LockManager::new());
    let a = manager.acquire("/corpus/a.txt").await;

    // A different path must not block behind the held lock.
    let acquired = tokio::time::timeout(
        Duration::from_millis(100),
        manager.acquire("/corpus/b.txt"),
    )
    .await;
    assert!(acquired.is_ok());
    drop(a);
}

#[tokio::test]
async fn lock_is_reusable_after_release() {
    let manager = LockManager::new();
    drop(manager.acquire("/corpus/a.txt").await);
    drop(manager.acquire("/corpus/a.txt").await);
    assert_eq!(manager.len(), 1);
}
