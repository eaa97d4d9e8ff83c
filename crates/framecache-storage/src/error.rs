//! Storage error types.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid videoID: {0}")]
    InvalidVideoId(#[from] framecache_models::VideoIdError),

    #[error("kv error: {0}")]
    Kv(#[from] framecache_kv::KvError),
}
