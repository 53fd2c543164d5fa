mod file_config;

pub use file_config::{AgentConfig, AgentLlmConfig, FileConfig, ResearchConfig};

use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub llm_provider: Option<String>,
    pub llm_base_url: Option<String>,
    pub model: Option<String>,
    pub llm_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    /// When absent, sessions live in memory only.
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub llm: LlmSettings,
    pub research: ResearchSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file.db_dir.map(PathBuf::from).or_else(|| cli.db_dir.clone());
        if let Some(dir) = &db_dir {
            if !dir.exists() {
                bail!("Database directory does not exist: {:?}", dir);
            }
            if !dir.is_dir() {
                bail!("db_dir is not a directory: {:?}", dir);
            }
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| RequestsLoggingLevel::parse(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        // LLM settings - [agent.llm] over CLI over defaults
        let llm_file = file.agent.and_then(|a| a.llm).unwrap_or_default();
        let llm_defaults = LlmSettings::default();
        let provider = llm_file
            .provider
            .or_else(|| cli.llm_provider.clone())
            .unwrap_or(llm_defaults.provider);
        if !LLM_PROVIDERS.contains(&provider.as_str()) {
            bail!(
                "Unknown LLM provider '{}', expected one of: {}",
                provider,
                LLM_PROVIDERS.join(", ")
            );
        }
        let llm = LlmSettings {
            provider,
            base_url: llm_file
                .base_url
                .or_else(|| cli.llm_base_url.clone())
                .unwrap_or(llm_defaults.base_url),
            model: llm_file
                .model
                .or_else(|| cli.model.clone())
                .unwrap_or(llm_defaults.model),
            api_key: llm_file.api_key.or_else(|| cli.llm_api_key.clone()),
            api_key_command: llm_file.api_key_command,
            temperature: llm_file.temperature.unwrap_or(llm_defaults.temperature),
            timeout_secs: llm_file.timeout_secs.unwrap_or(llm_defaults.timeout_secs),
        };

        let research_file = file.research.unwrap_or_default();
        let research_defaults = ResearchSettings::default();
        let research = ResearchSettings {
            tavily_api_key: research_file
                .tavily_api_key
                .or_else(|| cli.tavily_api_key.clone())
                .filter(|k| !k.trim().is_empty()),
            tavily_max_results: research_file
                .tavily_max_results
                .unwrap_or(research_defaults.tavily_max_results),
            duckduckgo_enabled: research_file
                .duckduckgo_enabled
                .unwrap_or(research_defaults.duckduckgo_enabled),
            timeout_secs: research_file
                .timeout_secs
                .unwrap_or(research_defaults.timeout_secs),
        };

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            llm,
            research,
        })
    }

    pub fn sessions_db_path(&self) -> Option<PathBuf> {
        self.db_dir.as_ref().map(|dir| dir.join("sessions.db"))
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            frontend_dir_path: self.frontend_dir_path.clone(),
        }
    }
}

const LLM_PROVIDERS: &[&str] = &["openai", "ollama"];

/// Settings for the text generation backend.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "google/gemini-2.0-flash-001".to_string(),
            api_key: None,
            api_key_command: None,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

/// Settings for the research fallback chain.
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    /// Tavily is skipped when no key is configured.
    pub tavily_api_key: Option<String>,
    pub tavily_max_results: usize,
    pub duckduckgo_enabled: bool,
    pub timeout_secs: u64,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            tavily_max_results: 5,
            duckduckgo_enabled: true,
            timeout_secs: 30,
        }
    }
}
