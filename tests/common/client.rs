//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per session endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Session Endpoints
    // ========================================================================

    pub async fn start(&self, topic: &str) -> Response {
        self.client
            .post(format!("{}/start", self.base_url))
            .json(&json!({ "topic": topic }))
            .send()
            .await
            .expect("Start request failed")
    }

    pub async fn get_state(&self, session_id: &str) -> Response {
        self.client
            .get(format!("{}/state/{}", self.base_url, session_id))
            .send()
            .await
            .expect("State request failed")
    }

    pub async fn feedback(&self, session_id: &str, action: &str, text: Option<&str>) -> Response {
        self.post_feedback(json!({
            "session_id": session_id,
            "action": action,
            "feedback_text": text,
        }))
        .await
    }

    /// Sends a raw feedback body, for alias and malformed-input tests.
    pub async fn post_feedback(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/feedback", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Feedback request failed")
    }

    pub async fn health(&self) -> Response {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .expect("Health request failed")
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Starts a session and returns its id.
    pub async fn start_session(&self, topic: &str) -> String {
        let response = self.start(topic).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("Invalid start response");
        body["session_id"]
            .as_str()
            .expect("Missing session_id")
            .to_string()
    }

    pub async fn state(&self, session_id: &str) -> Value {
        let response = self.get_state(session_id).await;
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.expect("Invalid state response")
    }

    /// Polls until the session reaches one of the given statuses.
    ///
    /// # Panics
    ///
    /// Panics if no such status is observed within the settle timeout.
    pub async fn wait_for_status(&self, session_id: &str, statuses: &[&str]) -> Value {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SESSION_SETTLE_TIMEOUT_MS);

        loop {
            let state = self.state(session_id).await;
            let status = state["status"].as_str().unwrap_or_default();
            if statuses.contains(&status) {
                return state;
            }
            if start.elapsed() > timeout {
                panic!(
                    "Session {} stuck in '{}' while waiting for {:?}",
                    session_id, status, statuses
                );
            }
            tokio::time::sleep(Duration::from_millis(SESSION_POLL_INTERVAL_MS)).await;
        }
    }

    /// Polls until `done` holds for the session state.
    ///
    /// # Panics
    ///
    /// Panics if the condition is not met within the settle timeout.
    pub async fn wait_until(&self, session_id: &str, done: impl Fn(&Value) -> bool) -> Value {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SESSION_SETTLE_TIMEOUT_MS);

        loop {
            let state = self.state(session_id).await;
            if done(&state) {
                return state;
            }
            if start.elapsed() > timeout {
                panic!("Session {} did not settle, last state: {}", session_id, state);
            }
            tokio::time::sleep(Duration::from_millis(SESSION_POLL_INTERVAL_MS)).await;
        }
    }

    /// Submits feedback, retrying while the previous run is still finishing.
    /// Returns the final status and JSON body.
    pub async fn feedback_when_idle(
        &self,
        session_id: &str,
        action: &str,
        text: Option<&str>,
    ) -> (StatusCode, Value) {
        self.post_feedback_when_idle(json!({
            "session_id": session_id,
            "action": action,
            "feedback_text": text,
        }))
        .await
    }

    pub async fn post_feedback_when_idle(&self, body: Value) -> (StatusCode, Value) {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SESSION_SETTLE_TIMEOUT_MS);

        loop {
            let response = self.post_feedback(body.clone()).await;
            let status = response.status();
            let reply: Value = response.json().await.unwrap_or_default();
            let still_running = status == StatusCode::CONFLICT
                && reply["error"]
                    .as_str()
                    .is_some_and(|e| e.contains("still running"));
            if !still_running || start.elapsed() > timeout {
                return (status, reply);
            }
            tokio::time::sleep(Duration::from_millis(SESSION_POLL_INTERVAL_MS)).await;
        }
    }

    /// Starts a session and waits for its first draft.
    pub async fn start_and_wait_for_draft(&self, topic: &str) -> (String, Value) {
        let session_id = self.start_session(topic).await;
        let state = self.wait_for_status(&session_id, &["interrupted"]).await;
        (session_id, state)
    }
}
