// SPDX-License-Identifier: MIT

//! Passage rows: deterministic identity for citation stability.
//!
//! Upserted on every query that returns grounding chunks. Rows are never
//! deleted; a re-indexed file's old passages are marked stale but preserved
//! so session replay keeps resolving citations.

use crate::db::Store;
use crate::error::StoreError;
use crate::retry::with_busy_retry;
use carrel_core::{passage_hash, passage_id, PassageRecord};
use rusqlite::params;

impl Store {
    /// Insert or refresh the passage row for `(file_id, text)`.
    ///
    /// Returns the deterministic passage id. A known id refreshes
    /// `last_seen_at` and clears the stale flag; text identity makes the
    /// operation idempotent.
    pub fn touch_passage(
        &self,
        file_id: &str,
        text: &str,
        now: &str,
    ) -> Result<String, StoreError> {
        let id = passage_id(file_id, text).to_string();
        let hash = passage_hash(text);
        let conn = self.conn()?;
        with_busy_retry(|| {
            conn.execute(
                "INSERT INTO passages
                    (passage_id, file_id, content_hash, passage_text, stale, created_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
                 ON CONFLICT(passage_id) DO UPDATE SET
                    last_seen_at = excluded.last_seen_at,
                    stale = 0",
                params![id, file_id, hash, text, now],
            )
        })?;
        Ok(id)
    }

    /// Look up a passage by id (for citation validation and replay).
    pub fn get_passage(&self, passage_id: &str) -> Result<Option<PassageRecord>, StoreError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT passage_id, file_id, content_hash, passage_text, stale,
                        created_at, last_seen_at
                 FROM passages WHERE passage_id = ?1",
                params![passage_id],
                |row| {
                    Ok(PassageRecord {
                        passage_id: row.get(0)?,
                        file_id: row.get(1)?,
                        content_hash: row.get(2)?,
                        passage_text: row.get(3)?,
                        stale: row.get::<_, i64>(4)? != 0,
                        created_at: row.get(5)?,
                        last_seen_at: row.get(6)?,
                    })
                },
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Sqlite(other)),
            })?;
        Ok(record)
    }

    /// Mark every passage of a file stale (called when the file's content
    /// hash changes). Rows are preserved for session replay.
    pub fn mark_passages_stale(&self, file_id: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let rows = with_busy_retry(|| {
            conn.execute(
                "UPDATE passages SET stale = 1 WHERE file_id = ?1",
                params![file_id],
            )
        })?;
        Ok(rows)
    }
}

#[cfg(test)]
#[path = "passages_tests.rs"]
mod tests;
