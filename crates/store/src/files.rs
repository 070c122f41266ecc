// SPDX-License-Identifier: MIT

//! File row operations: scanner upsert, OCC reads and guarded updates,
//! eligibility listing, and administrative recovery.

use crate::db::Store;
use crate::error::StoreError;
use crate::retry::with_busy_retry;
use carrel_core::{FileRecord, FileState, TransitionPayload};
use rusqlite::{params, Connection, Row, TransactionBehavior};

/// Input for [`Store::discover_or_update`].
#[derive(Debug, Clone)]
pub struct ScanUpsert {
    pub path: String,
    pub content_hash: String,
    pub mtime_ms: u64,
    pub meta_json: String,
    pub now: String,
}

/// What the scanner upsert did with the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New path, fresh untracked row
    Discovered,
    /// Same content hash as the active row; only mtime refreshed
    Unchanged,
    /// Content changed: active row marked stale, superseding row inserted
    Superseded,
}

/// Arguments for the single guarded OCC update.
#[derive(Debug, Clone)]
pub struct GuardedUpdate<'a> {
    pub path: &'a str,
    pub expected_state: FileState,
    pub expected_version: i64,
    pub new_state: FileState,
    pub payload: &'a TransitionPayload,
    pub now: &'a str,
}

/// Per-state row counts for the status display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounts {
    pub untracked: usize,
    pub uploading: usize,
    pub processing: usize,
    pub indexed: usize,
    pub failed: usize,
}

impl IngestCounts {
    pub fn total(&self) -> usize {
        self.untracked + self.uploading + self.processing + self.indexed + self.failed
    }
}

impl Store {
    /// Idempotent scanner upsert.
    ///
    /// Unknown path inserts an `untracked` row. Known path with the same
    /// content hash refreshes mtime only. A changed hash marks the active
    /// row stale and inserts a superseding `untracked` row in the same
    /// transaction.
    pub fn discover_or_update(&self, upsert: &ScanUpsert) -> Result<UpsertOutcome, StoreError> {
        let mut conn = self.conn()?;
        let outcome = with_busy_retry(|| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let existing: Option<String> = tx
                .query_row(
                    "SELECT content_hash FROM files WHERE path = ?1 AND stale = 0",
                    params![upsert.path],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|err| match err {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            let outcome = match existing {
                None => {
                    insert_untracked(&tx, upsert)?;
                    UpsertOutcome::Discovered
                }
                Some(hash) if hash == upsert.content_hash => {
                    tx.execute(
                        "UPDATE files SET mtime_ms = ?1 WHERE path = ?2 AND stale = 0",
                        params![upsert.mtime_ms as i64, upsert.path],
                    )?;
                    UpsertOutcome::Unchanged
                }
                Some(_) => {
                    tx.execute(
                        "UPDATE files SET stale = 1 WHERE path = ?1 AND stale = 0",
                        params![upsert.path],
                    )?;
                    insert_untracked(&tx, upsert)?;
                    UpsertOutcome::Superseded
                }
            };
            tx.commit()?;
            Ok(outcome)
        })?;
        Ok(outcome)
    }

    /// Fresh (state, version) of the active row. Never cached by callers.
    pub fn read_state(&self, path: &str) -> Result<(FileState, i64), StoreError> {
        let conn = self.conn()?;
        let (state, version): (String, i64) = conn
            .query_row(
                "SELECT state, version FROM files WHERE path = ?1 AND stale = 0",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    Err(StoreError::NotFound(path.to_string()))
                }
                other => Err(StoreError::Sqlite(other)),
            })?;
        let state = FileState::parse(&state)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown state '{state}' for {path}")))?;
        Ok((state, version))
    }

    /// The single guarded OCC write.
    ///
    /// One UPDATE whose WHERE clause carries both prior state and prior
    /// version; the returned rowcount is the OCC verdict. Rowcount 0 means
    /// another worker advanced the row (or a buggy caller tried to skip a
    /// state) and nothing was written. Runs in an immediate transaction so
    /// the write reservation is taken up front.
    pub fn guarded_update(&self, update: &GuardedUpdate<'_>) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let rows = with_busy_retry(|| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let rows = tx.execute(
                "UPDATE files SET
                    state = ?1,
                    version = version + 1,
                    updated_at = ?2,
                    last_error = COALESCE(?3, last_error),
                    failure_stage = COALESCE(?4, failure_stage),
                    remote_file_id = COALESCE(?5, remote_file_id),
                    remote_store_id = COALESCE(?6, remote_store_id)
                 WHERE path = ?7 AND state = ?8 AND version = ?9 AND stale = 0",
                params![
                    update.new_state.to_string(),
                    update.now,
                    update.payload.error,
                    update.payload.failure_stage,
                    update.payload.remote_file_id,
                    update.payload.remote_store_id,
                    update.path,
                    update.expected_state.to_string(),
                    update.expected_version,
                ],
            )?;
            if rows == 0 {
                // Nothing matched; roll back the reservation.
                tx.rollback()?;
            } else {
                tx.commit()?;
            }
            Ok(rows)
        })?;
        Ok(rows)
    }

    /// Active rows in the given states, ordered by path for a stable cursor.
    pub fn list_eligible(
        &self,
        states: &[FileState],
        limit: usize,
    ) -> Result<Vec<FileRecord>, StoreError> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> =
            (1..=states.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT path, content_hash, mtime_ms, meta_json, enrichment_json, state, version,
                    updated_at, last_error, failure_stage, remote_file_id, remote_store_id, stale
             FROM files WHERE stale = 0 AND state IN ({})
             ORDER BY path LIMIT ?{}",
            placeholders.join(", "),
            states.len() + 1,
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = states
            .iter()
            .map(|s| Box::new(s.to_string()) as Box<dyn rusqlite::types::ToSql>)
            .collect();
        values.push(Box::new(limit as i64));
        let params = rusqlite::params_from_iter(values.iter().map(|v| v.as_ref()));
        let rows = stmt.query_map(params, row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }

    /// Full active row for a path.
    pub fn get_file(&self, path: &str) -> Result<FileRecord, StoreError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT path, content_hash, mtime_ms, meta_json, enrichment_json, state, version,
                        updated_at, last_error, failure_stage, remote_file_id, remote_store_id, stale
                 FROM files WHERE path = ?1 AND stale = 0",
                params![path],
                row_to_record,
            )
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    Err(StoreError::NotFound(path.to_string()))
                }
                other => Err(StoreError::Sqlite(other)),
            })??;
        Ok(record)
    }

    /// Per-state counts over active rows.
    pub fn ingest_counts(&self) -> Result<IngestCounts, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT state, COUNT(*) FROM files WHERE stale = 0 GROUP BY state")?;
        let mut counts = IngestCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (state, count) = row?;
            let count = count as usize;
            match FileState::parse(&state) {
                Some(FileState::Untracked) => counts.untracked = count,
                Some(FileState::Uploading) => counts.uploading = count,
                Some(FileState::Processing) => counts.processing = count,
                Some(FileState::Indexed) => counts.indexed = count,
                Some(FileState::Failed) => counts.failed = count,
                None => return Err(StoreError::Corrupt(format!("unknown state '{state}'"))),
            }
        }
        Ok(counts)
    }

    /// Administrative recovery: requeue failed rows as untracked.
    ///
    /// Explicitly manual; the automated worker never transitions out of a
    /// terminal state. Returns the number of rows requeued.
    pub fn reset_failed(&self, limit: usize) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let rows = with_busy_retry(|| {
            conn.execute(
                "UPDATE files SET
                    state = 'untracked',
                    version = version + 1,
                    last_error = NULL,
                    failure_stage = NULL
                 WHERE stale = 0 AND state = 'failed' AND path IN (
                    SELECT path FROM files WHERE stale = 0 AND state = 'failed'
                    ORDER BY path LIMIT ?1
                 )",
                params![limit as i64],
            )
        })?;
        Ok(rows)
    }
}

fn insert_untracked(conn: &Connection, upsert: &ScanUpsert) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO files (path, content_hash, mtime_ms, meta_json, state, version, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'untracked', 0, ?5)",
        params![
            upsert.path,
            upsert.content_hash,
            upsert.mtime_ms as i64,
            upsert.meta_json,
            upsert.now,
        ],
    )?;
    Ok(())
}

fn row_to_record(row: &Row<'_>) -> Result<Result<FileRecord, StoreError>, rusqlite::Error> {
    let state: String = row.get(5)?;
    let path: String = row.get(0)?;
    let parsed = match FileState::parse(&state) {
        Some(parsed) => parsed,
        None => {
            return Ok(Err(StoreError::Corrupt(format!(
                "unknown state '{state}' for {path}"
            ))))
        }
    };
    Ok(Ok(FileRecord {
        path,
        content_hash: row.get(1)?,
        mtime_ms: row.get::<_, i64>(2)? as u64,
        meta_json: row.get(3)?,
        enrichment_json: row.get(4)?,
        state: parsed,
        version: row.get(6)?,
        updated_at: row.get(7)?,
        last_error: row.get(8)?,
        failure_stage: row.get(9)?,
        remote_file_id: row.get(10)?,
        remote_store_id: row.get(11)?,
        stale: row.get::<_, i64>(12)? != 0,
    }))
}

#[cfg(test)]
#[path = "files_tests.rs"]
mod tests;
