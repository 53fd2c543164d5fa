//! Scripted port implementations for unit tests.

use crate::agent::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
};
use crate::agent::research::{ResearchError, ResearchSource};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Answers by prompt kind: notes for the researcher, numbered drafts for the writer.
pub struct ScriptedLlm {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_research: bool,
    fail_revisions: bool,
    delay: Duration,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_research: false,
            fail_revisions: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing_research(mut self) -> Self {
        self.fail_research = true;
        self
    }

    pub fn failing_revisions(mut self) -> Self {
        self.fail_revisions = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, prompt: &str, call: usize) -> Result<String, LlmError> {
        if prompt.starts_with("You are a Lead Researcher") {
            if self.fail_research {
                return Err(LlmError::Api {
                    status: 503,
                    message: "model overloaded".to_string(),
                });
            }
            return Ok(format!("notes #{}", call));
        }
        if prompt.contains("Previous Draft:") {
            if self.fail_revisions {
                return Err(LlmError::Timeout);
            }
            return Ok(format!("# Revised draft #{}", call));
        }
        Ok(format!("# Draft #{}", call))
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let result = self.respond(prompt, call);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(CompletionResponse {
            message: Message::assistant(result?),
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

pub struct StaticResearch;

#[async_trait]
impl ResearchSource for StaticResearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn lookup(&self, query: &str) -> Result<String, ResearchError> {
        Ok(format!("Source: https://example.org\nFacts about {}", query))
    }
}
