//! Error types for the key-value client.

use thiserror::Error;

pub type KvResult<T> = Result<T, KvError>;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("retries exhausted for operation {operation} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl KvError {
    /// Connection-level and IO-level Redis errors are treated as transient
    /// and worth retrying; protocol/type errors on a successful connection
    /// are not.
    pub fn is_transient(&self) -> bool {
        match self {
            KvError::Redis(e) => e.is_connection_dropped() || e.is_timeout() || e.is_io_error(),
            _ => false,
        }
    }
}
