use std::collections::HashMap;
use std::sync::RwLock;

/// Errors raised by background session runs, keyed by session id.
///
/// Consulted before the session store on every poll.
#[derive(Default)]
pub struct FaultRegistry {
    faults: RwLock<HashMap<String, String>>,
}

impl FaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault. The first recorded message for a session is kept.
    pub fn record(&self, session_id: &str, message: impl Into<String>) {
        self.faults
            .write()
            .unwrap()
            .entry(session_id.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, session_id: &str) -> Option<String> {
        self.faults.read().unwrap().get(session_id).cloned()
    }
}
