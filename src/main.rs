use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scribe_server::agent::llm::{CompletionOptions, LlmProvider, OllamaProvider, OpenAIProvider};
use scribe_server::agent::research::LayeredResearch;
use scribe_server::agent::workflow::WorkflowEngine;
use scribe_server::config::{self, LlmSettings};
use scribe_server::coordinator::SessionCoordinator;
use scribe_server::server::{metrics, run_server, RequestsLoggingLevel};
use scribe_server::session_store::{InMemorySessionStore, SessionStore, SqliteSessionStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory for sessions.db. Sessions are kept in memory when omitted.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// LLM backend: "openai" (any OpenAI-compatible API) or "ollama".
    #[clap(long)]
    pub llm_provider: Option<String>,

    /// Base URL of the LLM API.
    #[clap(long)]
    pub llm_base_url: Option<String>,

    /// Model identifier passed to the LLM API.
    #[clap(long, env = "MODEL_NAME")]
    pub model: Option<String>,

    /// API key for the LLM backend.
    #[clap(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Tavily API key. Without it research falls back to DuckDuckGo.
    #[clap(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    pub tavily_api_key: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            llm_provider: args.llm_provider.clone(),
            llm_base_url: args.llm_base_url.clone(),
            model: args.model.clone(),
            llm_api_key: args.llm_api_key.clone(),
            tavily_api_key: args.tavily_api_key.clone(),
        }
    }
}

fn make_llm_provider(settings: &LlmSettings) -> Arc<dyn LlmProvider> {
    match settings.provider.as_str() {
        "ollama" => Arc::new(OllamaProvider::new(&settings.base_url, &settings.model)),
        _ => match &settings.api_key_command {
            Some(command) => Arc::new(OpenAIProvider::with_key_command(
                &settings.base_url,
                &settings.model,
                command.clone(),
            )),
            None => Arc::new(OpenAIProvider::new(
                &settings.base_url,
                &settings.model,
                settings.api_key.clone(),
            )),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);
    info!(
        "  llm: {} {} at {}",
        app_config.llm.provider, app_config.llm.model, app_config.llm.base_url
    );

    info!("Initializing metrics...");
    metrics::init_metrics();

    let session_store: Arc<dyn SessionStore> = match app_config.sessions_db_path() {
        Some(path) => {
            info!("Opening session database at {:?}...", path);
            Arc::new(SqliteSessionStore::open(&path)?)
        }
        None => {
            warn!("No db_dir configured, sessions will not survive a restart");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let llm = make_llm_provider(&app_config.llm);
    if let Err(e) = llm.health_check().await {
        warn!("LLM backend {} is not reachable yet: {}", llm.name(), e);
    }

    let research = LayeredResearch::from_settings(
        app_config.research.tavily_api_key.clone(),
        app_config.research.tavily_max_results,
        app_config.research.duckduckgo_enabled,
        Duration::from_secs(app_config.research.timeout_secs),
    );
    info!("Research sources: {}", research.source_names().join(" -> "));

    let engine = WorkflowEngine::new(llm, Arc::new(research), session_store)
        .with_completion_options(CompletionOptions {
            temperature: app_config.llm.temperature,
            max_tokens: None,
            timeout: Duration::from_secs(app_config.llm.timeout_secs),
        });
    let coordinator = Arc::new(SessionCoordinator::new(Arc::new(engine)));

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);
    run_server(app_config.server_config(), coordinator).await
}
