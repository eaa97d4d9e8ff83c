//! Job executor: round-robin dequeue across `[high, default]`, one job at a
//! time per process, plus the minimal health endpoint the harness exposes.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, warn};

use framecache_eviction::{EvictionConfig, EvictionEngine};
use framecache_kv::KvClient;
use framecache_models::{JobRecord, QueueName, VideoId};
use framecache_queue::JobQueue;
use framecache_render::{
    ChainResolver, FfmpegExtractor, RenderConfig, RenderError, RenderOutcome, RenderTask, StaticProxyPool,
    YtDlpStrategy,
};
use framecache_storage::ThumbnailStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;

pub type WorkerRenderTask = RenderTask<YtDlpStrategy, YtDlpStrategy, FfmpegExtractor, Arc<StaticProxyPool>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Busy,
    Suspended,
}

#[derive(Serialize)]
struct HealthBody {
    state: WorkerState,
    current_job: Option<String>,
}

struct SharedStatus {
    state: RwLock<WorkerState>,
    current_job: RwLock<Option<String>>,
}

impl SharedStatus {
    fn new() -> Self {
        Self {
            state: RwLock::new(WorkerState::Idle),
            current_job: RwLock::new(None),
        }
    }
}

async fn health_handler(State(status): State<Arc<SharedStatus>>) -> Response {
    let state = *status.state.read().await;
    let current_job = status.current_job.read().await.clone();
    let code = if state == WorkerState::Suspended {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (code, axum::Json(HealthBody { state, current_job })).into_response()
}

/// Pulls jobs from the queue and runs them one at a time; throughput comes
/// from running more worker processes, not from concurrency within one.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: JobQueue,
    render: WorkerRenderTask,
    status: Arc<SharedStatus>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, kv: KvClient) -> Self {
        let queue = JobQueue::new(&kv);
        let storage = ThumbnailStore::new(config.thumbnail_storage.path.clone(), kv.clone());

        let eviction_config = EvictionConfig {
            max_size: config.thumbnail_storage.max_size,
            cleanup_multiplier: config.thumbnail_storage.cleanup_multiplier,
            redis_offset_allowed: config.thumbnail_storage.redis_offset_allowed,
        };
        let eviction = EvictionEngine::new(kv.clone(), storage.clone(), queue.clone(), eviction_config);

        let mut urls = Vec::new();
        if let Some(url) = &config.proxy_url {
            urls.push(url.clone());
        }
        if let Some(list) = &config.proxy_urls {
            urls.extend(list.iter().cloned());
        }
        let proxy_pool = Arc::new(StaticProxyPool::new(urls));

        let render_config = RenderConfig {
            default_max_height: config.default_max_height,
            max_concurrent_renders: config.max_concurrent_renders,
            skip_local_ffmpeg: config.skip_local_ffmpeg,
            ..RenderConfig::default()
        };
        let resolver = ChainResolver::new(None, YtDlpStrategy);
        let render = RenderTask::new(kv, storage, eviction, resolver, FfmpegExtractor, proxy_pool, render_config);

        Self { config, queue, render, status: Arc::new(SharedStatus::new()) }
    }

    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> WorkerResult<()> {
        let health_addr: std::net::SocketAddr =
            format!("{}:{}", self.config.server.host, self.config.server.worker_health_check_port)
                .parse()
                .expect("invalid health bind address");
        let health_router = Router::new().route("/health", get(health_handler)).with_state(Arc::clone(&self.status));
        let health_listener = tokio::net::TcpListener::bind(health_addr).await?;
        let mut health_shutdown = shutdown.clone();
        let health_task = tokio::spawn(async move {
            let _ = axum::serve(health_listener, health_router)
                .with_graceful_shutdown(async move {
                    let _ = health_shutdown.changed().await;
                })
                .await;
        });

        let reaper_queue = self.queue.clone();
        let mut reaper_shutdown = shutdown.clone();
        let reaper_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reaper_shutdown.changed() => break,
                    _ = tokio::time::sleep(Duration::from_secs(10)) => {}
                }
                match reaper_queue.reap_timed_out().await {
                    Ok(n) if n > 0 => warn!(count = n, "reaped started jobs past their timeout"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "job timeout reaper failed"),
                }
            }
        });

        let mut order = [QueueName::High, QueueName::Default];
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.queue.pop_round_robin(&order).await {
                Ok(Some((queue, record))) => self.run_one(queue, record).await,
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to dequeue, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }

            order.rotate_left(1);
        }

        *self.status.state.write().await = WorkerState::Suspended;
        let _ = health_task.await;
        reaper_task.abort();
        Ok(())
    }

    async fn run_one(&self, queue: QueueName, record: JobRecord) {
        let logger = JobLogger::new(&record.job_id, "render");
        *self.status.state.write().await = WorkerState::Busy;
        *self.status.current_job.write().await = Some(record.job_id.to_string());
        logger.log_start(&format!("{} @ {}", record.video_id, record.time));

        let result = self.generate_with_retry(&record).await;

        match result {
            Ok(outcome) if outcome.rendered => {
                logger.log_completion("rendered");
                if let Err(e) = self.queue.mark_finished(queue, &record.job_id).await {
                    error!(job_id = %record.job_id, error = %e, "failed to mark job finished");
                }
            }
            Ok(_) => {
                logger.log_warning("no playable format at or below max height");
                if let Err(e) = self.queue.mark_failed(queue, &record.job_id, "no playable format").await {
                    error!(job_id = %record.job_id, error = %e, "failed to mark job failed");
                }
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                if let Err(mark_err) = self.queue.mark_failed(queue, &record.job_id, &e.to_string()).await {
                    error!(job_id = %record.job_id, error = %mark_err, "failed to mark job failed");
                }
            }
        }

        *self.status.current_job.write().await = None;
        *self.status.state.write().await = WorkerState::Idle;
    }

    /// Retries exactly once, after a 1s delay, when the first attempt fails
    /// with `GenerationFailed` (extraction/output-validation failure). Other
    /// failure kinds (unplayable, login-required, no suitable format) are
    /// terminal and not retried.
    async fn generate_with_retry(&self, record: &JobRecord) -> Result<RenderOutcome, RenderError> {
        let attempt = |video_id: VideoId| {
            self.render.generate(
                video_id,
                record.time,
                record.title.clone(),
                record.is_livestream,
                record.update_accounting,
            )
        };

        match attempt(record.video_id.clone()).await {
            Err(RenderError::GenerationFailed { .. }) => {
                tokio::time::sleep(Duration::from_secs(1)).await;
                attempt(record.video_id.clone()).await
            }
            other => other,
        }
    }
}
