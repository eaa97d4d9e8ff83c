//! Typed async Redis client shared by the queue, storage, eviction, render
//! and API crates: one multiplexed connection for request/response commands,
//! a dedicated pub/sub connection per subscriber, and a named retry wrapper
//! applied to every sensitive operation.

pub mod client;
pub mod error;
pub mod retry;

pub use client::{KvClient, Subscription};
pub use error::{KvError, KvResult};
pub use retry::RetryPolicy;
