//! The single error enum the HTTP boundary speaks. Every other crate's error
//! converts into this one with `#[from]`; `ApiError` is the only enum that
//! implements `IntoResponse`, so the redirect-fallback rule and the error-kind
//! table are both realized in exactly one place.

use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("thumbnail not cached")]
    CacheMissNoTime,

    #[error("thumbnail not generated yet")]
    NotReady,

    #[error("wait for thumbnail timed out")]
    Timeout,

    #[error("failed to generate thumbnail")]
    RenderFailed,

    #[error("queue too big")]
    QueueFull,

    #[error("server error")]
    ServerError,

    #[error("unauthorized")]
    Unauthorized,

    #[error("kv error: {0}")]
    Kv(#[from] framecache_kv::KvError),

    #[error("queue error: {0}")]
    Queue(#[from] framecache_queue::QueueError),

    #[error("storage error: {0}")]
    Storage(#[from] framecache_storage::StorageError),

    #[error("render error: {0}")]
    Render(#[from] framecache_render::RenderError),
}

impl ApiError {
    fn failure_reason(&self) -> String {
        match self {
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::CacheMissNoTime => "Thumbnail not cached".to_string(),
            ApiError::NotReady | ApiError::Timeout => "Thumbnail not generated yet".to_string(),
            ApiError::RenderFailed => "Failed to generate thumbnail".to_string(),
            ApiError::QueueFull => "queue too big".to_string(),
            ApiError::ServerError => "Server error".to_string(),
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::Kv(_) | ApiError::Queue(_) | ApiError::Storage(_) => "Server error".to_string(),
            ApiError::Render(e) => format!("Failed to generate thumbnail: {e}"),
        }
    }

    /// `InvalidRequest` is the one kind with a real status code; everything
    /// else on the thumbnail path degrades to a body-less 204, with the
    /// reason carried in `X-Failure-Reason` instead.
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::NO_CONTENT,
        }
    }

    /// Apply the redirect-fallback rule: when `redirect_url` begins with
    /// `https://i.ytimg.com`, any non-success path becomes a 307 there
    /// instead of the kind's default status and body.
    pub fn into_response_with_redirect(self, redirect_url: Option<&str>) -> Response {
        if let Some(url) = redirect_url {
            if url.starts_with("https://i.ytimg.com") {
                return Redirect::temporary(url).into_response();
            }
        }
        self.into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = self.failure_reason();
        (status, [(HeaderName::from_static("x-failure-reason"), reason)]).into_response()
    }
}
