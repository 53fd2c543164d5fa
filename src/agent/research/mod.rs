//! Research lookup port.
//!
//! The researcher stage only needs `lookup(topic) -> text`. Concrete sources
//! (Tavily, DuckDuckGo) can fail or be unconfigured, so they are chained by
//! [`LayeredResearch`], which ends in a deterministic [`PlaceholderSource`].

mod duckduckgo;
mod placeholder;
mod tavily;

pub use duckduckgo::DuckDuckGoSource;
pub use placeholder::PlaceholderSource;
pub use tavily::TavilySource;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when looking up research material.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Research source unavailable: {0}")]
    Unavailable(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No results for query")]
    EmptyResult,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ResearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ResearchError::InvalidResponse(e.to_string())
        } else {
            ResearchError::Request(e.to_string())
        }
    }
}

/// A source of raw research text for a topic.
#[async_trait]
pub trait ResearchSource: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Look up material about `query`.
    async fn lookup(&self, query: &str) -> Result<String, ResearchError>;
}

/// Tries each source in order and returns the first successful lookup.
///
/// A failing source is logged and skipped. If every source fails, the error
/// of the last one is returned; with a [`PlaceholderSource`] at the end of
/// the chain that never happens.
pub struct LayeredResearch {
    sources: Vec<Arc<dyn ResearchSource>>,
}

impl LayeredResearch {
    pub fn new(sources: Vec<Arc<dyn ResearchSource>>) -> Self {
        Self { sources }
    }

    /// Build the standard chain: Tavily (when a key is given), DuckDuckGo
    /// (when enabled), then the placeholder.
    pub fn from_settings(
        tavily_api_key: Option<String>,
        tavily_max_results: usize,
        duckduckgo_enabled: bool,
        timeout: std::time::Duration,
    ) -> Self {
        let mut sources: Vec<Arc<dyn ResearchSource>> = Vec::new();
        if let Some(key) = tavily_api_key.filter(|k| !k.trim().is_empty()) {
            sources.push(Arc::new(TavilySource::new(key, tavily_max_results, timeout)));
        }
        if duckduckgo_enabled {
            sources.push(Arc::new(DuckDuckGoSource::new(timeout)));
        }
        sources.push(Arc::new(PlaceholderSource));
        Self::new(sources)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl ResearchSource for LayeredResearch {
    fn name(&self) -> &str {
        "layered"
    }

    async fn lookup(&self, query: &str) -> Result<String, ResearchError> {
        let mut last_error = ResearchError::Unavailable("no research sources configured".into());
        for source in &self.sources {
            match source.lookup(query).await {
                Ok(text) => {
                    debug!(source = source.name(), chars = text.len(), "Research lookup succeeded");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Research lookup failed, trying next source");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
