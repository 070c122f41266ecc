// SPDX-License-Identifier: MIT

//! Bounded exponential backoff on SQLite lock contention.
//!
//! WAL mode serializes writers; under a full worker pool a BEGIN IMMEDIATE
//! can lose the race even with busy_timeout set. Every write path runs
//! through [`with_busy_retry`]: 3 attempts, 50ms initial delay, doubling.

use std::thread;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY: Duration = Duration::from_millis(50);

pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::DatabaseBusy
                    | rusqlite::ffi::ErrorCode::DatabaseLocked,
                ..
            },
            _,
        )
    )
}

/// Run `op`, retrying on lock contention. After the final attempt the busy
/// error propagates unchanged.
pub(crate) fn with_busy_retry<T>(
    mut op: impl FnMut() -> Result<T, rusqlite::Error>,
) -> Result<T, rusqlite::Error> {
    let mut delay = INITIAL_DELAY;
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if is_busy(&err) && attempt < MAX_ATTEMPTS => {
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "db busy, retrying");
                thread::sleep(delay);
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
