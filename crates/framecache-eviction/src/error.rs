//! Eviction error types.

use thiserror::Error;

pub type EvictionResult<T> = Result<T, EvictionError>;

#[derive(Debug, Error)]
pub enum EvictionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] framecache_storage::StorageError),

    #[error("kv error: {0}")]
    Kv(#[from] framecache_kv::KvError),

    #[error("queue error: {0}")]
    Queue(#[from] framecache_queue::QueueError),
}
