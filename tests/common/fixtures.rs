//! Mock ports for end-to-end tests
//!
//! The real server is spawned with these in place of the LLM and research
//! backends, so tests run offline and deterministically.

use super::constants::MOCK_LLM_FAILURE;
use async_trait::async_trait;
use scribe_server::agent::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
};
use scribe_server::agent::research::{ResearchError, ResearchSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// LLM answering by prompt kind with numbered outputs.
pub struct MockLlm {
    calls: AtomicUsize,
    fail_research: bool,
    delay: Duration,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_research: false,
            delay: Duration::ZERO,
        }
    }

    /// Fails every researcher prompt with an API error.
    #[allow(dead_code)]
    pub fn failing_research() -> Self {
        Self {
            fail_research: true,
            ..Self::new()
        }
    }

    /// Sleeps before every answer, keeping stages observable as running.
    #[allow(dead_code)]
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-1"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let content = if prompt.starts_with("You are a Lead Researcher") {
            if self.fail_research {
                return Err(LlmError::Api {
                    status: 503,
                    message: MOCK_LLM_FAILURE.to_string(),
                });
            }
            format!("1. Key Facts\n- mock fact #{}", call)
        } else if prompt.contains("Previous Draft:") {
            format!("# Revised draft #{}\n\nMore numbers.", call)
        } else {
            format!("# Draft #{}\n\nIntroduction.", call)
        };

        Ok(CompletionResponse {
            message: Message::assistant(content),
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// Research source returning a fixed snippet.
pub struct MockResearch;

#[async_trait]
impl ResearchSource for MockResearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn lookup(&self, query: &str) -> Result<String, ResearchError> {
        Ok(format!("Source: https://example.org\n{} are popular.", query))
    }
}
