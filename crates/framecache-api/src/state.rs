//! Application state: the handles shared across the dispatcher's handlers,
//! built once at startup and cloned per-request (every field is itself a
//! cheap handle: an `Arc` or a client wrapping a multiplexed connection).
//!
//! The dispatcher only enqueues and waits on pub/sub; the actual render
//! (resolver, extractor, `RenderTask`) lives in the worker process, not here.

use std::sync::Arc;

use framecache_kv::KvClient;
use framecache_queue::JobQueue;
use framecache_render::StaticProxyPool;
use framecache_storage::ThumbnailStore;

use crate::config::AppConfig;

fn configured_proxy_urls(config: &AppConfig) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(url) = &config.proxy_url {
        urls.push(url.clone());
    }
    if let Some(list) = &config.proxy_urls {
        urls.extend(list.iter().cloned());
    }
    urls
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub kv: KvClient,
    pub queue: JobQueue,
    pub storage: ThumbnailStore,
    pub proxy_pool: Arc<StaticProxyPool>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, framecache_kv::KvError> {
        let kv = KvClient::connect(&config.redis.url()).await?;
        let queue = JobQueue::new(&kv);
        let storage = ThumbnailStore::new(config.thumbnail_storage.path.clone(), kv.clone());

        let proxy_pool = Arc::new(StaticProxyPool::new(configured_proxy_urls(&config)));

        Ok(Self {
            config: Arc::new(config),
            kv,
            queue,
            storage,
            proxy_pool,
        })
    }
}
