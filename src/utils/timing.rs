use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "studio.timing";

#[derive(Debug)]
pub struct RequestTimer {
    method: String,
    path: String,
    query: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
}

impl RequestTimer {
    pub fn from_request(request: &Request) -> Self {
        let uri = request.uri();
        RequestTimer {
            method: request.method().to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(|value| value.chars().take(300).collect()),
            started_at: Utc::now(),
            started_perf: Instant::now(),
        }
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            "event=request_received method={} path={} query={:?} received_at={}",
            self.method,
            self.path,
            self.query,
            self.started_at.to_rfc3339()
        );
    }

    pub fn log_completed(&self, status: u16) {
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=request_completed method={} path={} started_at={} response_sent_at={} duration_s={:.3} status={}",
            self.method,
            self.path,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            status
        );
    }
}

/// Middleware that writes a received/completed pair to the timing log for every request.
pub async fn log_request_timing(request: Request, next: Next) -> Response {
    let timer = RequestTimer::from_request(&request);
    timer.log_received();
    let response = next.run(request).await;
    timer.log_completed(response.status().as_u16());
    response
}

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_err() { "error" } else { "success" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}
