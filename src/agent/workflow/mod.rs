//! Content workflow: Researcher -> Writer -> human review loop.
//!
//! A session is suspended at the human gate after every writer run. Reviewer
//! feedback is recorded on the session, and `resume` applies the gate rule:
//! approve and stop, stop at the revision cap, or run the writer again.

mod engine;
mod history;
pub mod prompts;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{PortError, WorkflowEngine, WorkflowError};
pub use history::{HistoryEntry, Stage};
pub use state::{
    next_action, Feedback, NextAction, PausePoint, Session, SessionStatus, SessionView,
    TerminationReason, APPROVAL_SENTINEL, MAX_REVISIONS,
};
