//! The port the workflow uses to reach a language model.

use super::types::{CompletionResponse, FinishReason, Message};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub(super) const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Sampling temperature.
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Per-request deadline; the call fails with [`LlmError::Timeout`] past it.
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A chat model backend.
///
/// Backends implement `complete`. The researcher and writer stages only call
/// [`LlmProvider::generate`], which sends one user prompt and insists on a
/// non-blank answer.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend identifier used in logs, e.g. "openai".
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError>;

    async fn generate(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let response = self.complete(&[Message::user(prompt)], options).await?;

        if response.finish_reason == FinishReason::MaxTokens {
            warn!(model = %self.model(), "Completion stopped at the token limit");
        }
        if response.message.content.trim().is_empty() {
            return Err(LlmError::InvalidResponse(format!(
                "{} returned an empty completion",
                self.name()
            )));
        }
        Ok(response.message.content)
    }

    /// Cheap reachability probe, run once at startup.
    async fn health_check(&self) -> Result<(), LlmError>;
}

pub(super) fn map_request_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Connection(e.to_string())
    }
}

/// Turn a non-2xx reply into an error, keeping the upstream body as the message.
pub(super) async fn ensure_success(response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited);
    }
    let message = match response.text().await {
        Ok(body) if !body.trim().is_empty() => body,
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(LlmError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedProvider {
        reply: &'static str,
        finish_reason: FinishReason,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned-1"
        }

        async fn complete(
            &self,
            messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<CompletionResponse, LlmError> {
            assert_eq!(messages.len(), 1);
            Ok(CompletionResponse {
                message: Message::assistant(self.reply),
                finish_reason: self.finish_reason,
                usage: None,
            })
        }

        async fn health_check(&self) -> Result<(), LlmError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn generate_returns_content() {
        let provider = CannedProvider {
            reply: "# Tides\nThe moon pulls.",
            finish_reason: FinishReason::Stop,
        };
        let text = provider
            .generate("write about tides", &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "# Tides\nThe moon pulls.");
    }

    #[tokio::test]
    async fn generate_keeps_truncated_output() {
        let provider = CannedProvider {
            reply: "# Tides\nThe moon",
            finish_reason: FinishReason::MaxTokens,
        };
        let text = provider
            .generate("write about tides", &CompletionOptions::default())
            .await
            .unwrap();
        assert!(text.ends_with("moon"));
    }

    #[tokio::test]
    async fn generate_rejects_blank_output() {
        let provider = CannedProvider {
            reply: " \n ",
            finish_reason: FinishReason::Stop,
        };
        let err = provider
            .generate("write about tides", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert!(err.to_string().contains("canned"));
    }

    #[test]
    fn api_error_display_keeps_upstream_message() {
        let err = LlmError::Api {
            status: 401,
            message: "invalid api key".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 401): invalid api key");
    }
}
