//! DuckDuckGo instant-answer client.
//!
//! Needs no API key. The instant-answer endpoint often has nothing for
//! long-tail topics; an empty answer is reported as [`ResearchError::EmptyResult`]
//! so the caller moves on to the next source.

use super::{ResearchError, ResearchSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DUCKDUCKGO_API_BASE: &str = "https://api.duckduckgo.com/";
const MAX_RELATED_TOPICS: usize = 8;

pub struct DuckDuckGoSource {
    client: Client,
    timeout: Duration,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a plain topic or a named group of topics.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    #[serde(default)]
    topics: Vec<RelatedTopic>,
}

impl DuckDuckGoSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

fn collect_topics<'a>(topics: &'a [RelatedTopic], out: &mut Vec<&'a RelatedTopic>) {
    for topic in topics {
        if out.len() >= MAX_RELATED_TOPICS {
            return;
        }
        if topic.text.as_deref().is_some_and(|t| !t.is_empty()) {
            out.push(topic);
        }
        collect_topics(&topic.topics, out);
    }
}

fn format_answer(answer: &InstantAnswer) -> Option<String> {
    let mut blocks = Vec::new();

    if !answer.abstract_text.is_empty() {
        let source = if answer.abstract_url.is_empty() {
            "N/A"
        } else {
            answer.abstract_url.as_str()
        };
        let mut block = format!("Source: {}\n", source);
        if !answer.heading.is_empty() {
            block.push_str(&answer.heading);
            block.push_str(": ");
        }
        block.push_str(&answer.abstract_text);
        blocks.push(block);
    }

    let mut related = Vec::new();
    collect_topics(&answer.related_topics, &mut related);
    for topic in related {
        blocks.push(format!(
            "Source: {}\n{}",
            topic.first_url.as_deref().unwrap_or("N/A"),
            topic.text.as_deref().unwrap_or_default()
        ));
    }

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}

#[async_trait]
impl ResearchSource for DuckDuckGoSource {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn lookup(&self, query: &str) -> Result<String, ResearchError> {
        let url = format!(
            "{}?q={}&format=json&no_html=1&skip_disambig=1",
            DUCKDUCKGO_API_BASE,
            urlencoding::encode(query)
        );
        debug!(query = %query, "Querying DuckDuckGo instant answers");

        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| ResearchError::InvalidResponse(e.to_string()))?;

        format_answer(&answer).ok_or(ResearchError::EmptyResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_abstract_and_nested_topics() {
        let body = r#"{
            "Heading": "Tide",
            "AbstractText": "Tides are the rise and fall of sea levels.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Tide",
            "RelatedTopics": [
                {"Text": "Tidal power", "FirstURL": "https://duckduckgo.com/Tidal_power"},
                {"Name": "See also", "Topics": [
                    {"Text": "Moon", "FirstURL": "https://duckduckgo.com/Moon"}
                ]}
            ]
        }"#;
        let answer: InstantAnswer = serde_json::from_str(body).unwrap();
        let text = format_answer(&answer).unwrap();

        assert!(text.starts_with(
            "Source: https://en.wikipedia.org/wiki/Tide\nTide: Tides are the rise and fall"
        ));
        assert!(text.contains("Source: https://duckduckgo.com/Tidal_power\nTidal power"));
        assert!(text.contains("Source: https://duckduckgo.com/Moon\nMoon"));
    }

    #[test]
    fn test_empty_answer_is_none() {
        let answer: InstantAnswer =
            serde_json::from_str(r#"{"AbstractText": "", "RelatedTopics": []}"#).unwrap();
        assert!(format_answer(&answer).is_none());
    }

    #[test]
    fn test_related_topics_are_capped() {
        let topics: Vec<String> = (0..20)
            .map(|i| format!(r#"{{"Text": "t{}", "FirstURL": "u{}"}}"#, i, i))
            .collect();
        let body = format!(r#"{{"RelatedTopics": [{}]}}"#, topics.join(","));
        let answer: InstantAnswer = serde_json::from_str(&body).unwrap();
        let text = format_answer(&answer).unwrap();
        assert_eq!(text.matches("Source:").count(), MAX_RELATED_TOPICS);
    }
}
