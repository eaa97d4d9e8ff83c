//! LRU eviction over the thumbnail storage root: a cleanup job triggered by
//! size or staleness, reconciled against the filesystem, and a two-phase
//! eviction loop (orphan sweep, then lowest-score `last-used` eviction).

pub mod config;
pub mod engine;
pub mod error;
pub mod fs_scan;

pub use config::EvictionConfig;
pub use engine::{EvictionEngine, LAST_STORAGE_CHECK_KEY, STORAGE_USED_KEY};
pub use error::{EvictionError, EvictionResult};
