//! Local models served by Ollama's `/api/chat`.

use super::provider::{
    ensure_success, map_request_error, CompletionOptions, LlmError, LlmProvider,
    HEALTH_CHECK_TIMEOUT,
};
use super::types::{CompletionResponse, FinishReason, Message, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// `base_url` is the server root, e.g. `http://localhost:11434`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn chat_request<'a>(
        &'a self,
        messages: &'a [Message],
        options: &CompletionOptions,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            options: ModelOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, messages = messages.len(), "Requesting Ollama chat");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.chat_request(messages, options))
            .timeout(options.timeout)
            .send()
            .await
            .map_err(map_request_error)?;

        let reply: ChatReply = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("malformed Ollama reply: {}", e)))?;

        Ok(reply.into())
    }

    /// Reachability plus a warning when the model has not been pulled.
    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(map_request_error)?;

        let tags: TagList = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("malformed tag list: {}", e)))?;

        if !tags.contains(&self.model) {
            warn!(
                model = %self.model,
                pulled = ?tags.models.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
                "Model is not pulled on the Ollama server"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    message: ReplyMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

impl From<ChatReply> for CompletionResponse {
    fn from(reply: ChatReply) -> Self {
        CompletionResponse {
            message: Message::assistant(reply.message.content),
            finish_reason: FinishReason::from_wire(reply.done_reason.as_deref()),
            usage: Some(TokenUsage::new(reply.prompt_eval_count, reply.eval_count)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

impl TagList {
    /// Ollama reports untagged pulls as `name:latest`.
    fn contains(&self, model: &str) -> bool {
        self.models
            .iter()
            .any(|t| t.name == model || t.name.strip_suffix(":latest") == Some(model))
    }
}
