// SPDX-License-Identifier: MIT

//! Store errors and their mapping into the failure taxonomy.

use crate::retry;
use carrel_core::FailureKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("no active row for path: {0}")]
    NotFound(String),

    #[error("unknown session: {0}")]
    SessionNotFound(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("schema migration {version} failed: {source}")]
    Migration {
        version: i64,
        source: rusqlite::Error,
    },
}

impl StoreError {
    /// Classify into the transport-agnostic taxonomy.
    ///
    /// Constraint violations signal data corruption and crash-fail the
    /// worker; lock contention that survived the bounded retry is transient.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            StoreError::Sqlite(err) if is_constraint(err) => FailureKind::IntegrityViolation,
            StoreError::Sqlite(err) if retry::is_busy(err) => FailureKind::Transient,
            StoreError::Corrupt(_) => FailureKind::IntegrityViolation,
            _ => FailureKind::Transient,
        }
    }
}

fn is_constraint(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                ..
            },
            _,
        )
    )
}
