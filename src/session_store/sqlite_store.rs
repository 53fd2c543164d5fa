//! SQLite store for sessions.

use super::schema::apply_schema;
use super::SessionStore;
use crate::agent::workflow::{Feedback, HistoryEntry, PausePoint, Session, Stage};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite implementation of SessionStore.
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Open or create a session database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open session database: {:?}", path))?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
        Ok(Session {
            id: row.get("id")?,
            topic: row.get("topic")?,
            research_notes: row.get("research_notes")?,
            draft: row.get("draft")?,
            pending_feedback: row
                .get::<_, Option<String>>("pending_feedback")?
                .and_then(|s| Feedback::parse(&s)),
            revision_count: row.get("revision_count")?,
            history: Vec::new(),
            pause_point: PausePoint::parse(&row.get::<_, String>("pause_point")?)
                .unwrap_or(PausePoint::None),
            fault: row.get("fault")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_history(row: &rusqlite::Row) -> rusqlite::Result<HistoryEntry> {
        let role: String = row.get("role")?;
        Ok(HistoryEntry {
            step_number: row.get("step_number")?,
            timestamp: row.get("timestamp")?,
            role: Stage::parse(&role).unwrap_or(Stage::Writer),
            content: row.get("content")?,
        })
    }

    fn load_history(conn: &Connection, id: &str) -> Result<Vec<HistoryEntry>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM session_history WHERE session_id = ?1 ORDER BY step_number",
        )?;
        let entries = stmt
            .query_map(params![id], Self::row_to_history)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl SessionStore for SqliteSessionStore {
    fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO sessions (
                id, topic, research_notes, draft, pending_feedback,
                revision_count, pause_point, fault, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                session.id,
                session.topic,
                session.research_notes,
                session.draft,
                session.pending_feedback.as_ref().map(|f| f.as_stored()),
                session.revision_count,
                session.pause_point.as_str(),
                session.fault,
                session.created_at,
                session.updated_at,
            ],
        )
        .with_context(|| format!("Failed to create session {}", session.id))?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        let session = conn
            .query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![id],
                Self::row_to_session,
            )
            .optional()?;

        match session {
            Some(mut session) => {
                session.history = Self::load_history(&conn, id)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    fn update_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            r#"
            UPDATE sessions SET
                research_notes = ?2, draft = ?3, pending_feedback = ?4,
                revision_count = ?5, pause_point = ?6, fault = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                session.id,
                session.research_notes,
                session.draft,
                session.pending_feedback.as_ref().map(|f| f.as_stored()),
                session.revision_count,
                session.pause_point.as_str(),
                session.fault,
                Self::now(),
            ],
        )?;
        if updated == 0 {
            bail!("Session not found: {}", session.id);
        }
        Ok(())
    }

    fn set_pending_feedback(&self, id: &str, feedback: Option<&Feedback>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE sessions SET pending_feedback = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, feedback.map(|f| f.as_stored()), Self::now()],
        )?;
        if updated == 0 {
            bail!("Session not found: {}", id);
        }
        Ok(())
    }

    fn set_fault(&self, id: &str, message: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE sessions SET fault = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, message, Self::now()],
        )?;
        if updated == 0 {
            bail!("Session not found: {}", id);
        }
        Ok(())
    }

    fn append_history(&self, id: &str, entry: &HistoryEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO session_history (session_id, step_number, timestamp, role, content)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id,
                entry.step_number,
                entry.timestamp,
                entry.role.as_str(),
                entry.content,
            ],
        )
        .with_context(|| format!("Failed to append history for session {}", id))?;
        Ok(())
    }

    fn get_history(&self, id: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        Self::load_history(&conn, id)
    }
}
