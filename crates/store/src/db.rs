// SPDX-License-Identifier: MIT

//! Store handle, pragmas, and forward-only migrations.

use crate::error::StoreError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Forward-only schema migrations. `schema_version.value` records the last
/// applied index + 1; on open any missing tail is applied atomically.
const MIGRATIONS: &[&str] = &[
    // 1: file lifecycle rows
    "CREATE TABLE files (
        path            TEXT NOT NULL,
        content_hash    TEXT NOT NULL,
        mtime_ms        INTEGER NOT NULL,
        meta_json       TEXT NOT NULL DEFAULT '{}',
        enrichment_json TEXT,
        state           TEXT NOT NULL CHECK (state IN
            ('untracked','uploading','processing','indexed','failed')),
        version         INTEGER NOT NULL DEFAULT 0 CHECK (version >= 0),
        updated_at      TEXT NOT NULL,
        last_error      TEXT,
        failure_stage   TEXT,
        remote_file_id  TEXT,
        remote_store_id TEXT,
        stale           INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (path, content_hash)
    );
    CREATE INDEX idx_files_state ON files(state);
    CREATE UNIQUE INDEX idx_files_active ON files(path) WHERE stale = 0;",
    // 2: passages for citation stability
    "CREATE TABLE passages (
        passage_id   TEXT PRIMARY KEY,
        file_id      TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        passage_text TEXT NOT NULL,
        stale        INTEGER NOT NULL DEFAULT 0,
        created_at   TEXT NOT NULL,
        last_seen_at TEXT NOT NULL
    );
    CREATE INDEX idx_passages_file ON passages(file_id);",
    // 3: sessions and the append-only event log
    "CREATE TABLE sessions (
        id         TEXT PRIMARY KEY,
        name       TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE session_events (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id   TEXT NOT NULL REFERENCES sessions(id),
        event_type   TEXT NOT NULL CHECK (event_type IN
            ('search','view','synthesize','note','error')),
        payload_json TEXT NOT NULL DEFAULT '{}',
        created_at   TEXT NOT NULL
    );
    CREATE INDEX idx_session_events_session ON session_events(session_id);
    CREATE TRIGGER session_events_touch AFTER INSERT ON session_events
    BEGIN
        UPDATE sessions SET updated_at = NEW.created_at WHERE id = NEW.session_id;
    END;",
];

/// Handle to the on-disk store.
///
/// Cheap to clone; every operation opens its own connection so concurrent
/// workers never share one. Writes go through the busy-retry in
/// [`crate::retry`].
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (creating if missing) and bring the schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let mut conn = store.conn()?;
        store.migrate(&mut conn)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection with the required pragmas applied.
    pub(crate) fn conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        Ok(conn)
    }

    fn migrate(&self, conn: &mut Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (value INTEGER NOT NULL)",
        )?;
        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(value), 0) FROM schema_version", [], |row| {
                row.get(0)
            })?;

        for (index, sql) in MIGRATIONS.iter().enumerate() {
            let version = index as i64 + 1;
            if version <= current {
                continue;
            }
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|source| StoreError::Migration { version, source })?;
            tx.execute("DELETE FROM schema_version", [])?;
            tx.execute("INSERT INTO schema_version (value) VALUES (?1)", [version])?;
            tx.commit()?;
            tracing::info!(version, "applied schema migration");
        }
        Ok(())
    }

    /// Current schema version, for diagnostics.
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COALESCE(MAX(value), 0) FROM schema_version", [], |row| {
            row.get(0)
        })?)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
