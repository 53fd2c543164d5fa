use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{log_requests, metrics, state::*, ServerConfig};
use crate::coordinator::{CoordinatorError, SessionCoordinator};
use std::sync::Arc;

#[derive(Serialize)]
struct ServerStats {
    pub name: &'static str,
    pub version: &'static str,
    pub uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct StartBody {
    #[serde(default)]
    pub topic: String,
}

#[derive(Serialize)]
struct StartResponse {
    session_id: String,
}

#[derive(Deserialize, Debug)]
struct FeedbackBody {
    #[serde(alias = "thread_id")]
    pub session_id: String,
    pub action: String,
    pub feedback_text: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

impl CoordinatorError {
    fn status_code(&self) -> StatusCode {
        match self {
            CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::NotFound(_) => StatusCode::NOT_FOUND,
            CoordinatorError::Faulted { .. }
            | CoordinatorError::Busy(_)
            | CoordinatorError::NotAwaitingReview(_) => StatusCode::CONFLICT,
            CoordinatorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime: format_uptime(state.start_time.elapsed()),
    };
    Json(stats)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn start_session(
    State(coordinator): State<GuardedCoordinator>,
    Json(body): Json<StartBody>,
) -> Response {
    match coordinator.handle_start(&body.topic) {
        Ok(session_id) => Json(StartResponse { session_id }).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_session_state(
    State(coordinator): State<GuardedCoordinator>,
    Path(session_id): Path<String>,
) -> Response {
    match coordinator.handle_poll(&session_id) {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn post_feedback(
    State(coordinator): State<GuardedCoordinator>,
    Json(body): Json<FeedbackBody>,
) -> Response {
    match coordinator.handle_feedback(
        &body.session_id,
        &body.action,
        body.feedback_text.as_deref(),
    ) {
        Ok(ack) => Json(ack).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn make_app(config: ServerConfig, coordinator: Arc<SessionCoordinator>) -> Result<Router> {
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        coordinator,
    };

    let session_routes: Router = Router::new()
        .route("/start", post(start_session))
        .route("/state/{session_id}", get(get_session_state))
        .route("/feedback", post(post_feedback))
        .route("/health", get(health))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .merge(session_routes)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(state, log_requests));

    Ok(app)
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(config: ServerConfig, coordinator: Arc<SessionCoordinator>) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, coordinator)?;

    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, make_metrics_app()).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    Ok(axum::serve(listener, app).await?)
}
