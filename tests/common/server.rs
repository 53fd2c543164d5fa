//! Per-test server instances
//!
//! Every `TestServer` owns a fresh SQLite session file in a temp dir and
//! serves the real router on an ephemeral localhost port.

use super::constants::*;
use super::fixtures::{MockLlm, MockResearch};
use scribe_server::agent::workflow::WorkflowEngine;
use scribe_server::coordinator::SessionCoordinator;
use scribe_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use scribe_server::session_store::SqliteSessionStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub struct TestServer {
    /// e.g. "http://127.0.0.1:40123"
    pub base_url: String,

    #[allow(dead_code)]
    pub port: u16,

    // Held so the database outlives the server
    _db_dir: TempDir,
    stop: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockLlm::new()).await
    }

    /// Panics if the store, the listener or the readiness probe fail.
    pub async fn spawn_with(llm: MockLlm) -> Self {
        let db_dir = TempDir::new().expect("temp dir");
        let store =
            SqliteSessionStore::open(&db_dir.path().join("sessions.db")).expect("session store");
        let engine = WorkflowEngine::new(Arc::new(llm), Arc::new(MockResearch), Arc::new(store));
        let coordinator = Arc::new(SessionCoordinator::new(Arc::new(engine)));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let app = make_app(
            ServerConfig {
                port,
                requests_logging_level: RequestsLoggingLevel::None,
                ..Default::default()
            },
            coordinator,
        )
        .expect("router");

        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = stopped.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                eprintln!("test server on port {} stopped: {}", port, e);
            }
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            _db_dir: db_dir,
            stop: Some(stop),
        };
        server.await_health().await;
        server
    }

    async fn await_health(&self) {
        let probe = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("probe client");
        let url = format!("{}/health", self.base_url);
        let deadline = Instant::now() + Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        while Instant::now() < deadline {
            if let Ok(response) = probe.get(&url).send().await {
                if response.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
        panic!("no healthy reply from {} after {}ms", url, SERVER_READY_TIMEOUT_MS);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
