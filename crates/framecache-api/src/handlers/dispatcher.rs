//! `getThumbnail`: the fast-path cache read, queue coalescing/promotion, and
//! the pub/sub wait for an in-flight render.

use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

use framecache_models::{JobId, JobRecord, QueueName, VideoId};
use framecache_queue::EnqueueOptions;
use framecache_storage::ThumbnailRead;

use crate::error::ApiError;
use crate::state::AppState;

const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(30);
const ENQUEUE_FAILURE_TTL: Duration = Duration::from_secs(500);
const ENQUEUE_TTL: Duration = Duration::from_secs(60);
const WAIT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct GetThumbnailQuery {
    #[serde(rename = "videoID")]
    pub video_id: String,
    pub time: Option<f64>,
    #[serde(rename = "generateNow", default)]
    pub generate_now: bool,
    pub title: Option<String>,
    #[serde(rename = "officialTime", default)]
    pub official_time: bool,
    #[serde(rename = "isLivestream", default)]
    pub is_livestream: bool,
    #[serde(rename = "redirectUrl")]
    pub redirect_url: Option<String>,
}

pub async fn get_thumbnail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GetThumbnailQuery>,
) -> Response {
    let redirect_url = query.redirect_url.clone();
    match get_thumbnail_inner(&state, &headers, query).await {
        Ok(response) => response,
        Err(err) => err.into_response_with_redirect(redirect_url.as_deref()),
    }
}

async fn get_thumbnail_inner(
    state: &AppState,
    headers: &HeaderMap,
    query: GetThumbnailQuery,
) -> Result<Response, ApiError> {
    let video_id =
        VideoId::parse(query.video_id).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    if query.official_time {
        if let Some(time) = query.time {
            let key = format!("best-{video_id}");
            if let Err(e) = state.kv.set(&key, &time.to_string()).await {
                warn!(video_id = %video_id, error = %e, "failed to record officialTime");
            }
        }
    }

    let cached = match query.time {
        Some(time) => state.storage.read_image(&video_id, time, query.is_livestream).await?,
        None => state.storage.latest_thumbnail(&video_id, query.is_livestream).await?,
    };
    if let Some(read) = cached {
        return Ok(thumbnail_response(&read));
    }

    let Some(time) = query.time else {
        return Err(ApiError::CacheMissNoTime);
    };

    let job_id = JobId::for_render(&video_id, time);
    let queue_name = if query.generate_now { QueueName::High } else { QueueName::Default };

    // Subscribe before touching the queue, so a completion published between
    // enqueue and the wait below is never missed.
    let subscription = state.kv.subscribe(job_id.as_str()).await?;

    let existing = state.queue.fetch_job(&job_id).await?;
    let mut adopted = existing.clone();

    if let Some(record) = &existing {
        if record.queue != queue_name {
            if record.is_started() {
                // adopt as-is; leave it on its current queue.
            } else if queue_name == QueueName::High && record.queue == QueueName::Default {
                state.queue.remove(record.queue, &job_id).await?;
                adopted = None;
            }
            // else: a default-priority request finds an existing queued
            // high-priority record; adopt it as-is (no downgrade).
        }
    }

    if adopted.as_ref().is_none_or(|r| r.is_finished()) {
        let queue_len = state.queue.len(queue_name).await?;
        if queue_len > state.config.thumbnail_storage.max_queue_size {
            return Err(ApiError::QueueFull);
        }

        let at_front = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == state.config.front_auth)
            .unwrap_or(false);

        let record = JobRecord::new(video_id.clone(), time, query.title.clone(), query.is_livestream, true, queue_name);
        let opts = EnqueueOptions::new(ENQUEUE_TIMEOUT, ENQUEUE_FAILURE_TTL, ENQUEUE_TTL).at_front(at_front);
        state.queue.enqueue(queue_name, &record, opts).await?;
        adopted = Some(record);
    }

    let current = adopted.expect("adopted is populated by the branches above");

    if current.is_failed() {
        return Err(ApiError::RenderFailed);
    }

    let position = state.queue.position(current.queue, &job_id).await?.unwrap_or(0);
    let high_len = state.queue.len(QueueName::High).await?;
    let max_before_async = state.config.thumbnail_storage.max_before_async_generation;

    let should_wait =
        position < max_before_async && (query.generate_now || high_len < max_before_async);
    if !should_wait {
        return Err(ApiError::NotReady);
    }

    match subscription.wait(WAIT_TIMEOUT).await {
        None => Err(ApiError::Timeout),
        Some(payload) if payload == "true" => {
            let read = match state.storage.read_image(&video_id, time, query.is_livestream).await? {
                Some(read) => Some(read),
                None => match state.storage.locate_by_truncated_prefix(&video_id, time).await? {
                    Some(found_time) => state.storage.read_image(&video_id, found_time, query.is_livestream).await?,
                    None => None,
                },
            };
            read.map(|r| thumbnail_response(&r)).ok_or(ApiError::ServerError)
        }
        Some(_) => Err(ApiError::RenderFailed),
    }
}

fn thumbnail_response(read: &ThumbnailRead) -> Response {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/webp")
        .header("X-Timestamp", read.time.to_string())
        .header(header::CACHE_CONTROL, "public, max-age=3600");

    if let Some(title) = &read.title {
        if let Some(value) = latin1_header_value(title.trim()) {
            response = response.header("X-Title", value);
        }
    }

    response
        .body(Body::from(read.bytes.clone()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Encode `s` as a Latin-1 header value; `None` if any character falls
/// outside the Latin-1 range, matching the "drop non-latin-1 titles" rule.
fn latin1_header_value(s: &str) -> Option<HeaderValue> {
    let mut bytes = Vec::with_capacity(s.len());
    for c in s.chars() {
        let code_point = c as u32;
        if code_point > 0xFF {
            return None;
        }
        bytes.push(code_point as u8);
    }
    HeaderValue::from_bytes(&bytes).ok()
}
