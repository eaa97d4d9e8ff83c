//! Prometheus metrics. The `dearrow_*` names are part of the external wire
//! contract (see module docs in `routes.rs`) and are not renamed even though
//! the rest of this crate uses a different project name.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

pub mod names {
    pub const WORKERS: &str = "dearrow_workers";
    pub const QUEUE_LENGTH: &str = "dearrow_queue_length";
    pub const WORKER_CURRENT_JOB: &str = "dearrow_worker_current_job";
    pub const CURRENT_TIME: &str = "dearrow_current_time";

    pub const HTTP_REQUESTS_TOTAL: &str = "dearrow_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "dearrow_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "dearrow_http_requests_in_flight";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "dearrow_rate_limit_hits_total";
}

/// Set the per-queue depth gauges, labelled `queue="high"` / `queue="low"`
/// (the default queue is reported under the legacy `low` label for wire
/// compatibility with the upstream dashboard).
pub fn set_queue_lengths(high: i64, default: i64) {
    gauge!(names::QUEUE_LENGTH, "queue" => "high").set(high as f64);
    gauge!(names::QUEUE_LENGTH, "queue" => "low").set(default as f64);
}

pub fn set_worker_count(count: i64) {
    gauge!(names::WORKERS).set(count as f64);
}

pub fn set_current_time(unix_seconds: f64) {
    gauge!(names::CURRENT_TIME).set(unix_seconds);
}

fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();
    record_http_request(&method, &path, status, duration);

    response
}
