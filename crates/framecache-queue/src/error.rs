//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("kv error: {0}")]
    Kv(#[from] framecache_kv::KvError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("job record is corrupt: {0}")]
    CorruptRecord(String),

    #[error("job {0} not found")]
    NotFound(String),
}
