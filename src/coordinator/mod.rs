//! Session coordinator.
//!
//! Maps start / poll / feedback requests onto workflow engine runs. Stage
//! execution happens on background tasks so requests return immediately;
//! failures are captured into a [`FaultRegistry`] instead of propagating.

mod fault_registry;

pub use fault_registry::FaultRegistry;

use crate::agent::workflow::{
    Feedback, SessionStatus, SessionView, WorkflowEngine, WorkflowError, APPROVAL_SENTINEL,
};
use crate::server::metrics;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Errors returned to callers of the coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{0}")]
    Validation(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {id} failed: {message}")]
    Faulted { id: String, message: String },

    #[error("Session {0} is still running, try again when the draft is ready")]
    Busy(String),

    #[error("Session {0} is not awaiting review")]
    NotAwaitingReview(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<WorkflowError> for CoordinatorError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::SessionNotFound(id) => CoordinatorError::NotFound(id),
            WorkflowError::SessionFaulted { id, message } => {
                CoordinatorError::Faulted { id, message }
            }
            other => CoordinatorError::Internal(other.to_string()),
        }
    }
}

/// Reviewer decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackAction {
    Approve,
    Revise,
}

impl FeedbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackAction::Approve => "approve",
            FeedbackAction::Revise => "revise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(FeedbackAction::Approve),
            "revise" => Some(FeedbackAction::Revise),
            _ => None,
        }
    }
}

/// Acknowledgement returned once feedback is recorded and the resume scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackAck {
    pub status: &'static str,
    pub message: &'static str,
}

impl FeedbackAck {
    fn for_action(action: FeedbackAction) -> Self {
        match action {
            FeedbackAction::Approve => Self {
                status: "approved",
                message: "Content approved. Finalising…",
            },
            FeedbackAction::Revise => Self {
                status: "revising",
                message: "Revision requested. Writer is working…",
            },
        }
    }
}

/// Validate a feedback submission into the value to record.
pub fn parse_feedback(action: &str, text: Option<&str>) -> Result<Feedback, CoordinatorError> {
    match FeedbackAction::parse(action) {
        Some(FeedbackAction::Approve) => Ok(Feedback::Approved),
        Some(FeedbackAction::Revise) => {
            let text = text.map(str::trim).unwrap_or_default();
            if text.is_empty() {
                return Err(CoordinatorError::Validation(
                    "feedback_text is required when action is 'revise'".to_string(),
                ));
            }
            // Stored feedback uses this value for approvals
            if text == APPROVAL_SENTINEL {
                return Err(CoordinatorError::Validation(format!(
                    "feedback_text '{}' is reserved",
                    APPROVAL_SENTINEL
                )));
            }
            Ok(Feedback::Revise(text.to_string()))
        }
        None => Err(CoordinatorError::Validation(format!(
            "Unknown action '{}'. Use 'approve' or 'revise'.",
            action
        ))),
    }
}

pub struct SessionCoordinator {
    engine: Arc<WorkflowEngine>,
    faults: Arc<FaultRegistry>,
    /// Latest background task per session.
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Ids handed out by `handle_start` whose record is not written yet, so
    /// they poll as "starting".
    issued: Arc<Mutex<HashSet<String>>>,
}

impl SessionCoordinator {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self {
            engine,
            faults: Arc::new(FaultRegistry::new()),
            tasks: Mutex::new(HashMap::new()),
            issued: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start a session and return its id without waiting for any stage.
    pub fn handle_start(&self, topic: &str) -> Result<String, CoordinatorError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CoordinatorError::Validation("topic is required".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.issued.lock().unwrap().insert(id.clone());

        let engine = self.engine.clone();
        let issued = self.issued.clone();
        let session_id = id.clone();
        let topic = topic.to_string();
        let mut tasks = self.tasks.lock().unwrap();
        self.spawn_tracked(&mut tasks, &id, async move {
            engine.create_session(&session_id, &topic)?;
            issued.lock().unwrap().remove(&session_id);
            engine.run_initial(&session_id).await
        });

        info!(session_id = %id, "Session scheduled");
        Ok(id)
    }

    /// Current view of a session. Recorded faults win over stored state.
    ///
    /// A session at the gate reads as running once feedback is accepted,
    /// before the resume task has picked it up.
    pub fn handle_poll(&self, session_id: &str) -> Result<SessionView, CoordinatorError> {
        if let Some(message) = self.faults.get(session_id) {
            self.issued.lock().unwrap().remove(session_id);
            let session = self.engine.session(session_id).ok().flatten();
            return Ok(SessionView::faulted(message, session.as_ref()));
        }

        let session = match self.engine.session(session_id)? {
            Some(session) => session,
            None if self.issued.lock().unwrap().contains(session_id) => {
                return Ok(SessionView::starting())
            }
            None => return Err(CoordinatorError::NotFound(session_id.to_string())),
        };

        let mut view = SessionView::from(&session);
        if session.is_awaiting_review()
            && (session.pending_feedback.is_some() || self.is_busy(session_id))
        {
            view.status = SessionStatus::Running;
        }
        Ok(view)
    }

    /// Record reviewer feedback and schedule the resume.
    pub fn handle_feedback(
        &self,
        session_id: &str,
        action: &str,
        text: Option<&str>,
    ) -> Result<FeedbackAck, CoordinatorError> {
        let feedback = parse_feedback(action, text)?;
        let action = if feedback.is_approval() {
            FeedbackAction::Approve
        } else {
            FeedbackAction::Revise
        };

        if let Some(message) = self.faults.get(session_id) {
            return Err(CoordinatorError::Faulted {
                id: session_id.to_string(),
                message,
            });
        }

        // Busy check, feedback write and spawn happen under one lock
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.get(session_id).is_some_and(|h| !h.is_finished()) {
            return Err(CoordinatorError::Busy(session_id.to_string()));
        }

        self.engine
            .submit_feedback(session_id, feedback)
            .map_err(|e| match e {
                WorkflowError::InvalidState(_) => {
                    CoordinatorError::NotAwaitingReview(session_id.to_string())
                }
                other => other.into(),
            })?;

        let engine = self.engine.clone();
        let id = session_id.to_string();
        self.spawn_tracked(&mut tasks, session_id, async move {
            engine.resume(&id).await.map(|_| ())
        });

        metrics::record_feedback(action.as_str());
        info!(session_id = %session_id, action = action.as_str(), "Feedback accepted");
        Ok(FeedbackAck::for_action(action))
    }

    /// Whether a background run is in flight for the session.
    pub fn is_busy(&self, session_id: &str) -> bool {
        self.tasks
            .lock()
            .unwrap()
            .get(session_id)
            .is_some_and(|h| !h.is_finished())
    }

    /// Spawn a session run. Errors and panics end up in the fault registry.
    fn spawn_tracked<F>(
        &self,
        tasks: &mut HashMap<String, JoinHandle<()>>,
        session_id: &str,
        work: F,
    ) where
        F: Future<Output = Result<(), WorkflowError>> + Send + 'static,
    {
        let faults = self.faults.clone();
        let id = session_id.to_string();
        let inner = tokio::spawn(work);
        let handle = tokio::spawn(async move {
            match inner.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(session_id = %id, error = %e, "Background session run failed");
                    faults.record(&id, e.to_string());
                }
                Err(e) => {
                    error!(session_id = %id, error = %e, "Background session task panicked");
                    faults.record(&id, format!("background task failed: {}", e));
                }
            }
        });

        tasks.retain(|_, h| !h.is_finished());
        if tasks.insert(session_id.to_string(), handle).is_some() {
            warn!(session_id = %session_id, "Replaced handle of a still running task");
        }
    }
}
