//! Tavily search API client.

use super::{ResearchError, ResearchSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

pub struct TavilySource {
    client: Client,
    api_key: String,
    max_results: usize,
    timeout: Duration,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    url: Option<String>,
    #[serde(default)]
    content: String,
}

impl TavilySource {
    pub fn new(api_key: impl Into<String>, max_results: usize, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            max_results,
            timeout,
        }
    }
}

/// Render results as `Source: <url>\n<content>` blocks separated by a blank line.
fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "Source: {}\n{}",
                r.url.as_deref().unwrap_or("N/A"),
                r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl ResearchSource for TavilySource {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn lookup(&self, query: &str) -> Result<String, ResearchError> {
        debug!(query = %query, max_results = self.max_results, "Querying Tavily");

        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                max_results: self.max_results,
            })
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::InvalidResponse(e.to_string()))?;

        if body.results.is_empty() {
            return Err(ResearchError::EmptyResult);
        }

        Ok(format_results(&body.results))
    }
}
