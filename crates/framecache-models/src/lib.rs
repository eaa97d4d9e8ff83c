//! Shared data models for the FrameCache backend.
//!
//! This crate provides the Serde-serializable types shared between the
//! dispatcher, worker, queue, storage and eviction crates: video identifiers,
//! job records, and the queue-name enum.

pub mod job;
pub mod video;

pub use job::{format_time, JobId, JobRecord, JobState, QueueName};
pub use video::{VideoId, VideoIdError};
