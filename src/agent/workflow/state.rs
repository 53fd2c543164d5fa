//! Session state definitions.

use super::history::{HistoryEntry, Stage};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Maximum number of revision-mode writer runs per session.
pub const MAX_REVISIONS: u32 = 5;

/// Stored value of `pending_feedback` meaning "approved".
pub const APPROVAL_SENTINEL: &str = "__APPROVED__";

/// Feedback recorded by the human reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Approved,
    Revise(String),
}

impl Feedback {
    /// Parse a stored feedback value. Empty means no feedback.
    pub fn parse(stored: &str) -> Option<Self> {
        match stored {
            "" => None,
            APPROVAL_SENTINEL => Some(Feedback::Approved),
            text => Some(Feedback::Revise(text.to_string())),
        }
    }

    pub fn as_stored(&self) -> &str {
        match self {
            Feedback::Approved => APPROVAL_SENTINEL,
            Feedback::Revise(text) => text,
        }
    }

    pub fn is_approval(&self) -> bool {
        matches!(self, Feedback::Approved)
    }
}

impl Serialize for Feedback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_stored())
    }
}

impl<'de> Deserialize<'de> for Feedback {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = String::deserialize(deserializer)?;
        Ok(Feedback::parse(&stored).unwrap_or(Feedback::Revise(stored)))
    }
}

/// Where a session is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PausePoint {
    /// Not suspended: created, or a stage is in flight.
    None,
    /// Waiting for reviewer feedback.
    HumanGate,
    /// Terminal.
    Done,
}

impl PausePoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            PausePoint::None => "none",
            PausePoint::HumanGate => "human_gate",
            PausePoint::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(PausePoint::None),
            "human_gate" => Some(PausePoint::HumanGate),
            "done" => Some(PausePoint::Done),
            _ => None,
        }
    }
}

/// Externally visible status label of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Starting,
    Running,
    Interrupted,
    Finished,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Starting => "starting",
            SessionStatus::Running => "running",
            SessionStatus::Interrupted => "interrupted",
            SessionStatus::Finished => "finished",
            SessionStatus::Error => "error",
        }
    }
}

/// The unit of work: one topic moving through research, drafting and review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub topic: String,
    pub research_notes: String,
    pub draft: String,
    pub pending_feedback: Option<Feedback>,
    pub revision_count: u32,
    pub history: Vec<HistoryEntry>,
    pub pause_point: PausePoint,
    pub fault: Option<String>,
    /// Unix timestamp (milliseconds).
    pub created_at: i64,
    /// Unix timestamp (milliseconds).
    pub updated_at: i64,
}

impl Session {
    pub fn new(id: impl Into<String>, topic: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            topic: topic.into(),
            research_notes: String::new(),
            draft: String::new(),
            pending_feedback: None,
            revision_count: 0,
            history: Vec::new(),
            pause_point: PausePoint::None,
            fault: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Faulted and finished sessions never run another stage.
    pub fn is_terminal(&self) -> bool {
        self.is_faulted() || self.pause_point == PausePoint::Done
    }

    pub fn is_awaiting_review(&self) -> bool {
        !self.is_faulted() && self.pause_point == PausePoint::HumanGate
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_faulted() {
            return SessionStatus::Error;
        }
        match self.pause_point {
            PausePoint::None => SessionStatus::Running,
            PausePoint::HumanGate => SessionStatus::Interrupted,
            PausePoint::Done => SessionStatus::Finished,
        }
    }

    /// Append a history record and return it.
    pub fn record(&mut self, stage: Stage, content: impl Into<String>) -> HistoryEntry {
        let entry = HistoryEntry::new(self.history.len() as u32, stage, content);
        self.history.push(entry.clone());
        self.touch();
        entry
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// Read-only projection returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub draft: String,
    pub status: SessionStatus,
    pub revision_count: u32,
    pub research_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionView {
    /// View of a session that has been issued but not yet persisted.
    pub fn starting() -> Self {
        Self {
            draft: String::new(),
            status: SessionStatus::Starting,
            revision_count: 0,
            research_data: String::new(),
            error: None,
        }
    }

    /// Error view. Content fields come from the stored session when one exists.
    pub fn faulted(message: impl Into<String>, session: Option<&Session>) -> Self {
        let mut view = session.map(Self::from).unwrap_or_else(Self::starting);
        view.status = SessionStatus::Error;
        view.error = Some(message.into());
        view
    }
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            draft: session.draft.clone(),
            status: session.status(),
            revision_count: session.revision_count,
            research_data: session.research_notes.clone(),
            error: session.fault.clone(),
        }
    }
}

/// Why a session stopped at the human gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Approved,
    RevisionCapReached,
    NoFeedback,
}

/// Outcome of the human-gate transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Terminate(TerminationReason),
    LoopToWriter,
}

/// The human-gate transition rule.
///
/// Order matters: approval beats the revision cap, and the cap beats the
/// feedback-presence check.
pub fn next_action(session: &Session) -> NextAction {
    match &session.pending_feedback {
        Some(Feedback::Approved) => NextAction::Terminate(TerminationReason::Approved),
        _ if session.revision_count >= MAX_REVISIONS => {
            NextAction::Terminate(TerminationReason::RevisionCapReached)
        }
        Some(Feedback::Revise(text)) if !text.trim().is_empty() => NextAction::LoopToWriter,
        _ => NextAction::Terminate(TerminationReason::NoFeedback),
    }
}
