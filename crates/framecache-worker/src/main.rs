//! Worker harness binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use framecache_kv::KvClient;
use framecache_worker::retry::{retry_async, RetryConfig, RetryResult};
use framecache_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("framecache=info".parse().unwrap()))
        .init();

    info!("Starting framecache-worker");

    let config = match WorkerConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let redis_url = config.redis.url();
    let retry_config = RetryConfig::new("redis_connect").with_max_retries(5);
    let kv = match retry_async(&retry_config, || KvClient::connect(&redis_url)).await {
        RetryResult::Success(kv) => kv,
        RetryResult::Failed { error, attempts } => {
            error!("Failed to connect to Redis after {} attempts: {}", attempts, error);
            std::process::exit(1);
        }
    };

    let executor = JobExecutor::new(config, kv);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let signal_task = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = executor.run(shutdown_rx).await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    signal_task.abort();
    info!("Worker shutdown complete");
}
