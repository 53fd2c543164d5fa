//! Language model backends behind the [`LlmProvider`] port.
//!
//! `openai` speaks the chat completions format (OpenRouter by default),
//! `ollama` talks to a local Ollama server.

mod api_key;
mod ollama;
mod openai;
mod provider;
mod types;

pub use api_key::ApiKeySource;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
