//! Database schema for session persistence.
//!
//! - sessions: one row per session, scalar workflow state
//! - session_history: append-only stage output log

use anyhow::{bail, Result};
use rusqlite::Connection;

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

pub const SESSIONS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    research_notes TEXT NOT NULL DEFAULT '',
    draft TEXT NOT NULL DEFAULT '',

    -- Empty or NULL = no feedback, '__APPROVED__' = approved
    pending_feedback TEXT,
    revision_count INTEGER NOT NULL DEFAULT 0,
    pause_point TEXT NOT NULL DEFAULT 'none',

    -- Set once, never cleared
    fault TEXT,

    -- Timestamps (Unix milliseconds)
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS session_history (
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    step_number INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    PRIMARY KEY (session_id, step_number)
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at);
"#;

/// Apply the schema, refusing databases written by a newer version.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        bail!(
            "Session database has schema version {} but this build supports up to {}",
            version,
            SCHEMA_VERSION
        );
    }

    conn.execute_batch(SESSIONS_SCHEMA_SQL)?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}
