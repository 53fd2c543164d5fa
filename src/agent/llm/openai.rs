//! Chat completions over the OpenAI wire format.
//!
//! OpenRouter is the default endpoint; any server exposing
//! `POST {base}/chat/completions` and `GET {base}/models` works.

use super::api_key::ApiKeySource;
use super::provider::{
    ensure_success, map_request_error, CompletionOptions, LlmError, LlmProvider,
    HEALTH_CHECK_TIMEOUT,
};
use super::types::{CompletionResponse, FinishReason, Message, TokenUsage};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shown in the OpenRouter dashboard next to usage.
const APP_TITLE: &str = "Scribe";

pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: ApiKeySource,
}

impl OpenAIProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self::with_source(base_url.into(), model.into(), api_key.into())
    }

    /// Like [`OpenAIProvider::new`], but the key is fetched by running
    /// `api_key_command` before each request.
    pub fn with_key_command(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key_command: String,
    ) -> Self {
        Self::with_source(
            base_url.into(),
            model.into(),
            ApiKeySource::Command(api_key_command),
        )
    }

    fn with_source(base_url: String, model: String, api_key: ApiKeySource) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    fn is_openrouter(&self) -> bool {
        self.base_url.contains("openrouter.ai")
    }

    async fn prepare(&self, request: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        let request = if self.is_openrouter() {
            request.header("X-Title", APP_TITLE)
        } else {
            request
        };
        self.api_key.authorize(request).await
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: Some(options.temperature),
            max_tokens: options.max_tokens,
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            "Requesting chat completion"
        );

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .timeout(options.timeout);
        let response = self
            .prepare(request)
            .await?
            .send()
            .await
            .map_err(map_request_error)?;

        let reply: ChatResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("malformed chat response: {}", e)))?;

        let completion = reply.into_completion()?;
        debug!(
            finish_reason = ?completion.finish_reason,
            total_tokens = completion.usage.map(|u| u.total_tokens),
            "Chat completion received"
        );
        Ok(completion)
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let request = self
            .client
            .get(format!("{}/models", self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT);
        let response = self
            .prepare(request)
            .await?
            .send()
            .await
            .map_err(map_request_error)?;
        ensure_success(response).await.map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        WireMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatResponse {
    fn into_completion(self) -> Result<CompletionResponse, LlmError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("chat response has no choices".to_string()))?;

        Ok(CompletionResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            finish_reason: FinishReason::from_wire(choice.finish_reason.as_deref()),
            usage: self
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }
}
