//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("kv error: {0}")]
    Kv(#[from] framecache_kv::KvError),
    #[error("queue error: {0}")]
    Queue(#[from] framecache_queue::QueueError),
    #[error("storage error: {0}")]
    Storage(#[from] framecache_storage::StorageError),
    #[error("render error: {0}")]
    Render(#[from] framecache_render::RenderError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
