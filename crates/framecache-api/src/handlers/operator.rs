//! `status`, `clearQueue`, and `floatie`: the operator-facing endpoints. Auth
//! comparisons against `status_auth_password`/`floatie_auth` use a
//! constant-time comparison so timing doesn't leak the secret.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use framecache_models::{QueueName, VideoId};
use framecache_render::{MetadataStrategy, ProxyPool};

use crate::state::AppState;

/// Compares two auth strings in time proportional to their length, not to
/// the position of the first mismatch.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default = "default_true")]
    #[serde(rename = "includeDefault")]
    pub include_default: bool,
    pub auth: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct QueueCounts {
    pub length: i64,
    pub scheduled_jobs: i64,
    pub finished_jobs: i64,
    pub failed_jobs: i64,
    pub started_jobs: i64,
    pub deferred_jobs: i64,
    pub cancelled_jobs: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub queues: QueuesStatus,
    pub workers: Vec<serde_json::Value>,
    pub workers_count: usize,
}

#[derive(Debug, Serialize)]
pub struct QueuesStatus {
    pub high: QueueCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<QueueCounts>,
}

pub async fn status(State(state): State<AppState>, Query(query): Query<StatusQuery>) -> Response {
    let _is_authorized = query
        .auth
        .as_deref()
        .map(|auth| constant_time_eq(auth, &state.config.status_auth_password))
        .unwrap_or(false);

    let high_len = state.queue.len(QueueName::High).await.unwrap_or(0);
    let default_len = state.queue.len(QueueName::Default).await.unwrap_or(0);

    let empty_counts = |length| QueueCounts {
        length,
        scheduled_jobs: 0,
        finished_jobs: 0,
        failed_jobs: 0,
        started_jobs: 0,
        deferred_jobs: 0,
        cancelled_jobs: 0,
    };

    let response = StatusResponse {
        queues: QueuesStatus {
            high: empty_counts(high_len),
            default: query.include_default.then(|| empty_counts(default_len)),
        },
        // This queue design has no worker registry in the KV store (each
        // worker process is reached only via its own /health port), so the
        // worker list is always empty here, same as the upstream "worker
        // list unavailable" fallback.
        workers: Vec::new(),
        workers_count: 0,
    };

    axum::Json(response).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ClearQueueQuery {
    pub auth: String,
    #[serde(default = "default_true")]
    pub low: bool,
    #[serde(default)]
    pub high: bool,
}

pub async fn clear_queue(State(state): State<AppState>, Query(query): Query<ClearQueueQuery>) -> StatusCode {
    if !constant_time_eq(&query.auth, &state.config.status_auth_password) {
        return StatusCode::NO_CONTENT;
    }

    if query.low {
        let _ = state.queue.empty(QueueName::Default).await;
    }
    if query.high {
        let _ = state.queue.empty(QueueName::High).await;
    }

    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct FloatieQuery {
    #[serde(rename = "videoID")]
    pub video_id: String,
    pub auth: String,
}

pub async fn floatie(State(state): State<AppState>, Query(query): Query<FloatieQuery>) -> Response {
    if !constant_time_eq(&query.auth, &state.config.floatie_auth) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let video_id = match VideoId::parse(query.video_id) {
        Ok(v) => v,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let proxy = state.proxy_pool.acquire().await;
    let proxy_url = proxy.as_ref().map(|p| p.url.as_str());

    match framecache_render::YtDlpStrategy.resolve(&video_id, proxy_url, false).await {
        Ok(outcome) => match serde_json::to_value(DebugOutcome::from(&outcome)) {
            Ok(value) => axum::Json(value).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        },
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
enum DebugOutcome {
    Playable { formats: Vec<DebugFormat> },
    Unplayable,
    LoginRequired,
}

#[derive(Debug, Serialize)]
struct DebugFormat {
    url: String,
    width: u32,
    height: u32,
    fps: u32,
    is_av1: bool,
}

impl From<&framecache_render::PlayabilityOutcome> for DebugOutcome {
    fn from(outcome: &framecache_render::PlayabilityOutcome) -> Self {
        match outcome {
            framecache_render::PlayabilityOutcome::Playable(formats) => DebugOutcome::Playable {
                formats: formats
                    .iter()
                    .map(|f| DebugFormat {
                        url: f.url.clone(),
                        width: f.width,
                        height: f.height,
                        fps: f.fps,
                        is_av1: f.is_av1,
                    })
                    .collect(),
            },
            framecache_render::PlayabilityOutcome::Unplayable => DebugOutcome::Unplayable,
            framecache_render::PlayabilityOutcome::LoginRequired => DebugOutcome::LoginRequired,
        }
    }
}
