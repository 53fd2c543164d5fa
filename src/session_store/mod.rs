//! Session persistence.
//!
//! The workflow engine reads and writes sessions only through [`SessionStore`],
//! so the same engine runs against SQLite in production and memory in tests.

mod memory_store;
mod schema;
mod sqlite_store;

pub use memory_store::InMemorySessionStore;
pub use sqlite_store::SqliteSessionStore;

use crate::agent::workflow::{Feedback, HistoryEntry, Session};
use anyhow::Result;

/// Trait for session storage operations.
///
/// All updates are scoped by session id; updating an unknown id is an error.
pub trait SessionStore: Send + Sync {
    /// Create a new session. Fails if the id already exists.
    fn create_session(&self, session: &Session) -> Result<()>;

    /// Get a session by ID, including its history.
    fn get_session(&self, id: &str) -> Result<Option<Session>>;

    /// Update the scalar fields of a session. History is not touched.
    fn update_session(&self, session: &Session) -> Result<()>;

    /// Set or clear the pending feedback.
    fn set_pending_feedback(&self, id: &str, feedback: Option<&Feedback>) -> Result<()>;

    /// Record a fault against a session.
    fn set_fault(&self, id: &str, message: &str) -> Result<()>;

    /// Append a history record.
    fn append_history(&self, id: &str, entry: &HistoryEntry) -> Result<()>;

    /// Get the history of a session in step order.
    fn get_history(&self, id: &str) -> Result<Vec<HistoryEntry>>;
}
