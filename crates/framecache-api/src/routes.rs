//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::dispatcher::get_thumbnail;
use crate::handlers::health::{healthz, readyz};
use crate::handlers::operator::{clear_queue, floatie, status};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache};
use crate::state::AppState;

/// No `/config` field backs a rate limit, so the default RPS mirrors the
/// teacher's fallback when a caller passes zero.
const DEFAULT_RATE_LIMIT_RPS: u32 = 50;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/getThumbnail", get(get_thumbnail))
        .route("/api/v1/status", get(status))
        .route("/api/v1/clearQueue", get(clear_queue))
        .route("/api/v1/floatie", get(floatie));

    let rate_limiter = Arc::new(RateLimiterCache::new(DEFAULT_RATE_LIMIT_RPS));

    let health_routes = Router::new().route("/healthz", get(healthz)).route("/readyz", get(readyz));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .route("/", get(|| async { Redirect::temporary("https://github.com/framecache/framecache") }))
        .merge(api_routes.layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware)))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&["*".to_string()]))
        .with_state(state)
}
