// SPDX-License-Identifier: MIT

//! Sessions and the append-only event log.

use crate::db::Store;
use crate::error::StoreError;
use crate::retry::with_busy_retry;
use carrel_core::{EventType, SessionEventRecord, SessionRecord};
use rusqlite::params;
use uuid::Uuid;

impl Store {
    /// Create a session with a fresh id.
    pub fn create_session(&self, name: &str, now: &str) -> Result<SessionRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn()?;
        with_busy_retry(|| {
            conn.execute(
                "INSERT INTO sessions (id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![id, name, now],
            )
        })?;
        Ok(SessionRecord {
            id,
            name: name.to_string(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        })
    }

    /// Look up a session by exact id, or by name as a fallback.
    pub fn get_session(&self, id_or_name: &str) -> Result<SessionRecord, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, created_at, updated_at FROM sessions
             WHERE id = ?1 OR name = ?1
             ORDER BY CASE WHEN id = ?1 THEN 0 ELSE 1 END
             LIMIT 1",
            params![id_or_name],
            row_to_session,
        )
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => {
                Err(StoreError::SessionNotFound(id_or_name.to_string()))
            }
            other => Err(StoreError::Sqlite(other)),
        })
    }

    /// All sessions, most recently updated first.
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, updated_at FROM sessions ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Append one event. The insert trigger advances the session's
    /// `updated_at`; the returned id is monotonic within the store.
    pub fn append_event(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: &serde_json::Value,
        now: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        with_busy_retry(|| {
            conn.execute(
                "INSERT INTO session_events (session_id, event_type, payload_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, event_type.to_string(), payload.to_string(), now],
            )
        })?;
        Ok(conn.last_insert_rowid())
    }

    /// Events for a session in insertion order.
    pub fn list_events(&self, session_id: &str) -> Result<Vec<SessionEventRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, event_type, payload_json, created_at
             FROM session_events WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (id, session_id, event_type, payload_json, created_at) = row?;
            let event_type = EventType::parse(&event_type).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown event type '{event_type}'"))
            })?;
            events.push(SessionEventRecord {
                id,
                session_id,
                event_type,
                payload_json,
                created_at,
            });
        }
        Ok(events)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<SessionRecord, rusqlite::Error> {
    Ok(SessionRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
