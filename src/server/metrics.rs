use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Scribe metrics
const PREFIX: &str = "scribe";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Workflow Metrics
    pub static ref SESSIONS_STARTED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_sessions_started_total"),
        "Total number of sessions started"
    ).expect("Failed to create sessions_started_total metric");

    pub static ref STAGE_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_stage_executions_total"), "Stage executions by outcome"),
        &["stage", "outcome"]
    ).expect("Failed to create stage_executions_total metric");

    // LLM calls dominate stage time, so buckets go up to minutes
    pub static ref STAGE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_stage_duration_seconds"),
            "Stage execution duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["stage"]
    ).expect("Failed to create stage_duration_seconds metric");

    pub static ref FEEDBACK_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_feedback_total"), "Reviewer feedback submissions"),
        &["action"]
    ).expect("Failed to create feedback_total metric");

    pub static ref SESSION_FAULTS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_session_faults_total"),
        "Total number of sessions that faulted"
    ).expect("Failed to create session_faults_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SESSIONS_STARTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STAGE_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STAGE_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(FEEDBACK_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SESSION_FAULTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_session_started() {
    SESSIONS_STARTED_TOTAL.inc();
}

/// Record a finished stage run. `outcome` is "ok" or "error".
pub fn record_stage_execution(stage: &str, outcome: &str, duration: Duration) {
    STAGE_EXECUTIONS_TOTAL
        .with_label_values(&[stage, outcome])
        .inc();

    STAGE_DURATION_SECONDS
        .with_label_values(&[stage])
        .observe(duration.as_secs_f64());
}

pub fn record_feedback(action: &str) {
    FEEDBACK_TOTAL.with_label_values(&[action]).inc();
}

pub fn record_session_fault() {
    SESSION_FAULTS_TOTAL.inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS is reported in kB
                    if let Some(kb) = line
                        .split_whitespace()
                        .nth(1)
                        .and_then(|s| s.parse::<f64>().ok())
                    {
                        PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                        return;
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_metric(name: &str) -> bool {
        REGISTRY.gather().iter().any(|m| m.get_name() == name)
    }

    #[test]
    fn test_metrics_initialization() {
        init_metrics();
        // Vec metrics only show up once a label set has been observed
        record_session_started();
        assert!(has_metric("scribe_sessions_started_total"));
    }

    #[test]
    fn test_record_http_request() {
        init_metrics();
        record_http_request("GET", "/state/abc", 200, Duration::from_millis(50));
        assert!(has_metric("scribe_http_requests_total"));
        assert!(has_metric("scribe_http_request_duration_seconds"));
    }

    #[test]
    fn test_record_stage_execution() {
        init_metrics();
        record_stage_execution("writer", "ok", Duration::from_secs(3));
        let before = STAGE_EXECUTIONS_TOTAL
            .with_label_values(&["writer", "ok"])
            .get();
        record_stage_execution("writer", "ok", Duration::from_secs(1));
        let after = STAGE_EXECUTIONS_TOTAL
            .with_label_values(&["writer", "ok"])
            .get();
        assert!(after >= before + 1.0);
        assert!(has_metric("scribe_stage_duration_seconds"));
    }

    #[test]
    fn test_record_feedback_and_faults() {
        init_metrics();
        record_feedback("approve");
        record_session_fault();
        assert!(has_metric("scribe_feedback_total"));
        assert!(has_metric("scribe_session_faults_total"));
    }
}
