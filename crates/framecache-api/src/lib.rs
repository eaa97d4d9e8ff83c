//! The HTTP dispatcher and operator surface: `getThumbnail`'s cache/queue
//! logic, `status`/`clearQueue`/`floatie` for operators, and the liveness/
//! readiness/metrics trio.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
