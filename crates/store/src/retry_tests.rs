// SPDX-License-Identifier: MIT

use super::*;

fn busy_error() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error {
            code: rusqlite::ffi::ErrorCode::DatabaseBusy,
            extended_code: 5,
        },
        Some("database is locked".into()),
    )
}

#[test]
fn succeeds_first_try_without_delay() {
    let mut calls = 0;
    let result = with_busy_retry(|| {
        calls += 1;
        Ok::<_, rusqlite::Error>(42)
    });
    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls, 1);
}

#[test]
fn retries_busy_then_succeeds() {
    let mut calls = 0;
    let result = with_busy_retry(|| {
        calls += 1;
        if calls < 3 {
            Err(busy_error())
        } else {
            Ok(7)
        }
    });
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls, 3);
}

#[test]
fn exhausts_after_three_attempts() {
    let mut calls = 0;
    let result: Result<(), _> = with_busy_retry(|| {
        calls += 1;
        Err(busy_error())
    });
    assert!(is_busy(&result.unwrap_err()));
    assert_eq!(calls, 3);
}

#[test]
fn non_busy_error_propagates_immediately() {
    let mut calls = 0;
    let result: Result<(), _> = with_busy_retry(|| {
        calls += 1;
        Err(rusqlite::Error::QueryReturnedNoRows)
    });
    assert!(matches!(result.unwrap_err(), rusqlite::Error::QueryReturnedNoRows));
    assert_eq!(calls, 1);
}
