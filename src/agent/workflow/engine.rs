//! Workflow engine.
//!
//! Drives a session through Researcher -> Writer -> human gate, and on
//! resume applies the gate transition rule.

use super::history::Stage;
use super::prompts;
use super::state::{next_action, Feedback, NextAction, PausePoint, Session, SessionView};
use crate::agent::llm::{CompletionOptions, LlmError, LlmProvider};
use crate::agent::research::{ResearchError, ResearchSource};
use crate::server::metrics;
use crate::session_store::SessionStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info};

/// Failure of one of the external ports during a stage.
#[derive(Debug, Error)]
pub enum PortError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Research(#[from] ResearchError),
}

/// Errors from workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {id} is faulted: {message}")]
    SessionFaulted { id: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: PortError,
    },

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Executes stages for sessions kept in a [`SessionStore`].
pub struct WorkflowEngine {
    llm: Arc<dyn LlmProvider>,
    research: Arc<dyn ResearchSource>,
    store: Arc<dyn SessionStore>,
    options: CompletionOptions,
    /// One guard per session; held for the whole of `run_initial` / `resume`.
    session_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl WorkflowEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        research: Arc<dyn ResearchSource>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            llm,
            research,
            store,
            options: CompletionOptions::default(),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_completion_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    fn session_lock(&self, id: &str) -> Arc<AsyncMutex<()>> {
        self.session_locks
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the guard entry of a session that will not run another stage.
    /// Waiters still holding the old guard see the terminal record and return.
    fn release_lock(&self, id: &str) {
        self.session_locks.lock().unwrap().remove(id);
    }

    fn load(&self, id: &str) -> Result<Session, WorkflowError> {
        self.store
            .get_session(id)?
            .ok_or_else(|| WorkflowError::SessionNotFound(id.to_string()))
    }

    /// Persist a fresh session record.
    pub fn create_session(&self, id: &str, topic: &str) -> Result<Session, WorkflowError> {
        let session = Session::new(id, topic);
        self.store.create_session(&session)?;
        metrics::record_session_started();
        info!(session_id = %id, topic = %topic, "Session created");
        Ok(session)
    }

    /// Run Researcher then Writer (initial draft) and suspend at the human gate.
    pub async fn run_initial(&self, id: &str) -> Result<(), WorkflowError> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let result = self.initial_locked(id).await;
        if matches!(
            result,
            Err(WorkflowError::Stage { .. }
                | WorkflowError::SessionFaulted { .. }
                | WorkflowError::SessionNotFound(_))
        ) {
            self.release_lock(id);
        }
        result
    }

    async fn initial_locked(&self, id: &str) -> Result<(), WorkflowError> {
        let mut session = self.load(id)?;
        if let Some(message) = session.fault.clone() {
            return Err(WorkflowError::SessionFaulted {
                id: id.to_string(),
                message,
            });
        }
        if session.pause_point != PausePoint::None || !session.draft.is_empty() {
            return Err(WorkflowError::InvalidState(format!(
                "session {} has already completed its initial run",
                id
            )));
        }

        self.run_researcher(&mut session).await?;
        self.run_writer(&mut session).await?;

        session.pause_point = PausePoint::HumanGate;
        session.touch();
        self.store.update_session(&session)?;
        info!(session_id = %id, "Draft ready for review");
        Ok(())
    }

    /// Create a session and run it up to the human gate.
    pub async fn start(&self, topic: &str) -> Result<String, WorkflowError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.create_session(&id, topic)?;
        self.run_initial(&id).await?;
        Ok(id)
    }

    /// Record reviewer feedback. Only valid while suspended at the human gate.
    pub fn submit_feedback(&self, id: &str, feedback: Feedback) -> Result<(), WorkflowError> {
        let session = self.load(id)?;
        if let Some(message) = session.fault {
            return Err(WorkflowError::SessionFaulted {
                id: id.to_string(),
                message,
            });
        }
        if !session.is_awaiting_review() {
            return Err(WorkflowError::InvalidState(format!(
                "session {} is not awaiting review",
                id
            )));
        }

        self.store.set_pending_feedback(id, Some(&feedback))?;
        debug!(session_id = %id, approved = feedback.is_approval(), "Feedback recorded");
        Ok(())
    }

    /// Evaluate the gate transition and either terminate or run a revision.
    ///
    /// Returns `None` when the session is already faulted or done.
    pub async fn resume(&self, id: &str) -> Result<Option<NextAction>, WorkflowError> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let result = self.resume_locked(id).await;
        if matches!(
            result,
            Ok(None | Some(NextAction::Terminate(_)))
                | Err(WorkflowError::Stage { .. } | WorkflowError::SessionNotFound(_))
        ) {
            self.release_lock(id);
        }
        result
    }

    async fn resume_locked(&self, id: &str) -> Result<Option<NextAction>, WorkflowError> {
        let mut session = self.load(id)?;
        if session.is_terminal() {
            debug!(session_id = %id, "Resume on terminal session ignored");
            return Ok(None);
        }
        if session.pause_point != PausePoint::HumanGate {
            return Err(WorkflowError::InvalidState(format!(
                "session {} is not suspended at the human gate",
                id
            )));
        }
        if session.pending_feedback.is_none() {
            return Err(WorkflowError::InvalidState(format!(
                "session {} has no feedback to act on",
                id
            )));
        }

        let action = next_action(&session);
        match action {
            NextAction::Terminate(reason) => {
                session.pause_point = PausePoint::Done;
                session.touch();
                self.store.update_session(&session)?;
                info!(
                    session_id = %id,
                    reason = ?reason,
                    revision_count = session.revision_count,
                    "Session finished"
                );
            }
            NextAction::LoopToWriter => {
                session.pause_point = PausePoint::None;
                session.touch();
                self.store.update_session(&session)?;

                self.run_writer(&mut session).await?;

                session.pause_point = PausePoint::HumanGate;
                session.touch();
                self.store.update_session(&session)?;
                info!(
                    session_id = %id,
                    revision_count = session.revision_count,
                    "Revision ready for review"
                );
            }
        }
        Ok(Some(action))
    }

    pub fn session(&self, id: &str) -> Result<Option<Session>, WorkflowError> {
        Ok(self.store.get_session(id)?)
    }

    pub fn snapshot(&self, id: &str) -> Result<Option<SessionView>, WorkflowError> {
        Ok(self.session(id)?.as_ref().map(SessionView::from))
    }

    async fn run_researcher(&self, session: &mut Session) -> Result<(), WorkflowError> {
        let started = Instant::now();
        info!(session_id = %session.id, topic = %session.topic, "Researcher stage started");

        let result: Result<String, PortError> = async {
            let lookup = self.research.lookup(&session.topic).await?;
            let prompt = prompts::research_prompt(&session.topic, &lookup);
            Ok(self.llm.generate(&prompt, &self.options).await?)
        }
        .await;

        let notes = match result {
            Ok(notes) => notes,
            Err(e) => return Err(self.fault(session, Stage::Researcher, e, started)),
        };

        metrics::record_stage_execution(Stage::Researcher.as_str(), "ok", started.elapsed());
        info!(
            session_id = %session.id,
            chars = notes.len(),
            "Researcher stage complete"
        );

        session.research_notes = notes.clone();
        let entry = session.record(Stage::Researcher, notes);
        self.store.append_history(&session.id, &entry)?;
        self.store.update_session(session)?;
        Ok(())
    }

    async fn run_writer(&self, session: &mut Session) -> Result<(), WorkflowError> {
        let started = Instant::now();
        let revision_feedback = match &session.pending_feedback {
            Some(Feedback::Revise(text)) if !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        };
        info!(
            session_id = %session.id,
            revision_count = session.revision_count,
            revision = revision_feedback.is_some(),
            "Writer stage started"
        );

        let prompt = match &revision_feedback {
            Some(feedback) => prompts::revision_prompt(
                &session.topic,
                &session.research_notes,
                &session.draft,
                feedback,
            ),
            None => prompts::initial_draft_prompt(&session.topic, &session.research_notes),
        };

        let draft = match self.llm.generate(&prompt, &self.options).await {
            Ok(draft) => draft,
            Err(e) => return Err(self.fault(session, Stage::Writer, e.into(), started)),
        };

        metrics::record_stage_execution(Stage::Writer.as_str(), "ok", started.elapsed());
        info!(session_id = %session.id, chars = draft.len(), "Writer stage complete");

        session.draft = draft.clone();
        if revision_feedback.is_some() {
            // Feedback is consumed by the revision it produced
            session.revision_count += 1;
            session.pending_feedback = None;
        }
        let entry = session.record(Stage::Writer, draft);
        self.store.append_history(&session.id, &entry)?;
        self.store.update_session(session)?;
        Ok(())
    }

    /// Mark the session faulted and build the error to return.
    fn fault(
        &self,
        session: &mut Session,
        stage: Stage,
        source: PortError,
        started: Instant,
    ) -> WorkflowError {
        let err = WorkflowError::Stage { stage, source };
        let message = err.to_string();

        metrics::record_stage_execution(stage.as_str(), "error", started.elapsed());
        metrics::record_session_fault();
        error!(session_id = %session.id, stage = %stage, error = %message, "Stage failed, session faulted");

        session.fault = Some(message.clone());
        if let Err(e) = self.store.set_fault(&session.id, &message) {
            error!(session_id = %session.id, error = %e, "Failed to persist session fault");
        }
        err
    }
}
