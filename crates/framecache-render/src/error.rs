//! Render task error types.

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid videoID: {0}")]
    InvalidVideoId(#[from] framecache_models::VideoIdError),

    #[error("invalid time: {0}")]
    InvalidTime(f64),

    #[error("storage error: {0}")]
    Storage(#[from] framecache_storage::StorageError),

    #[error("kv error: {0}")]
    Kv(#[from] framecache_kv::KvError),

    #[error("eviction error: {0}")]
    Eviction(#[from] framecache_eviction::EvictionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no playable formats for {0}, likely geoblocked")]
    Unplayable(String),

    #[error("login required for {0}")]
    LoginRequired(String),

    #[error("resolver error: {0}")]
    Resolver(String),

    #[error("no format with height <= {0}")]
    NoSuitableFormat(u32),

    #[error("failed to generate thumbnail for {video_id} at {time}: {reason}")]
    GenerationFailed {
        video_id: String,
        time: f64,
        reason: String,
    },
}
