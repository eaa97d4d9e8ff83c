//! The worker harness: round-robin queue consumption, one job at a time,
//! and the health endpoint the dispatcher's operator surface doesn't cover.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
