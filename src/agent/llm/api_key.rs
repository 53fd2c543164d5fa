//! Bearer credentials for hosted chat APIs.

use super::provider::LlmError;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const KEY_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the `Authorization` bearer token comes from.
#[derive(Debug, Clone)]
pub enum ApiKeySource {
    None,
    Static(String),
    /// Shell command run before every request; its trimmed stdout is the key.
    Command(String),
}

impl From<Option<String>> for ApiKeySource {
    fn from(key: Option<String>) -> Self {
        match key.filter(|k| !k.trim().is_empty()) {
            Some(key) => ApiKeySource::Static(key),
            None => ApiKeySource::None,
        }
    }
}

impl ApiKeySource {
    pub(super) async fn resolve(&self) -> Result<Option<String>, LlmError> {
        match self {
            ApiKeySource::None => Ok(None),
            ApiKeySource::Static(key) => Ok(Some(key.clone())),
            ApiKeySource::Command(cmd) => run_key_command(cmd).await.map(Some),
        }
    }

    /// Attach the key, if any, to an outgoing request.
    pub(super) async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, LlmError> {
        Ok(match self.resolve().await? {
            Some(key) => request.bearer_auth(key),
            None => request,
        })
    }
}

async fn run_key_command(cmd: &str) -> Result<String, LlmError> {
    debug!(command = %cmd, "Running api key command");

    let output = tokio::time::timeout(
        KEY_COMMAND_TIMEOUT,
        Command::new("sh").arg("-c").arg(cmd).output(),
    )
    .await
    .map_err(|_| {
        warn!(command = %cmd, "api key command timed out");
        LlmError::Timeout
    })?
    .map_err(|e| {
        warn!(command = %cmd, error = %e, "api key command could not start");
        LlmError::Connection(format!("could not run api key command: {}", e))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(command = %cmd, %stderr, "api key command exited with failure");
        return Err(LlmError::Connection(format!(
            "api key command exited with {}: {}",
            output.status, stderr
        )));
    }

    let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if key.is_empty() {
        return Err(LlmError::Connection(
            "api key command printed nothing".to_string(),
        ));
    }
    Ok(key)
}
