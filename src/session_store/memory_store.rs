use super::SessionStore;
use crate::agent::workflow::{Feedback, HistoryEntry, Session};
use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-local store. Sessions are lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_session<T>(&self, id: &str, f: impl FnOnce(&mut Session) -> T) -> Result<T> {
        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| anyhow!("Session not found: {}", id))?;
        let result = f(session);
        session.touch();
        Ok(result)
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        if sessions.contains_key(&session.id) {
            bail!("Session already exists: {}", session.id);
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().unwrap().get(id).cloned())
    }

    fn update_session(&self, session: &Session) -> Result<()> {
        self.with_session(&session.id, |stored| {
            let history = std::mem::take(&mut stored.history);
            *stored = Session {
                history,
                ..session.clone()
            };
        })
    }

    fn set_pending_feedback(&self, id: &str, feedback: Option<&Feedback>) -> Result<()> {
        self.with_session(id, |stored| stored.pending_feedback = feedback.cloned())
    }

    fn set_fault(&self, id: &str, message: &str) -> Result<()> {
        self.with_session(id, |stored| stored.fault = Some(message.to_string()))
    }

    fn append_history(&self, id: &str, entry: &HistoryEntry) -> Result<()> {
        self.with_session(id, |stored| stored.history.push(entry.clone()))
    }

    fn get_history(&self, id: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .sessions
            .read()
            .unwrap()
            .get(id)
            .map(|s| s.history.clone())
            .unwrap_or_default())
    }
}
