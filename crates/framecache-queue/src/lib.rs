//! Two-priority job queue (`high`, `default`) over the shared key-value
//! store: dedup by job-id, enqueue-at-front, and TTL/timeout bookkeeping.
//! Completion fan-out runs over `framecache_kv::KvClient::subscribe`
//! rather than a queue-owned pub/sub channel.

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::EnqueueOptions;
pub use queue::JobQueue;
