// SPDX-License-Identifier: MIT

//! Per-file lock manager.
//!
//! Maps file path → async mutex so only one worker drives a given file at a
//! time. The map itself is guarded by a meta-lock; per-file locks are held
//! across suspension points for the full transition, which is intentional
//! under cooperative scheduling. OCC remains the correctness backstop; the
//! lock keeps the common case race-free.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct LockManager {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `path`, creating it on first use.
    ///
    /// The guard is owned so it can be held across awaits and released on
    /// drop even if the worker task is cancelled.
    pub async fn acquire(&self, path: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(path.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of distinct paths ever locked (diagnostics).
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
