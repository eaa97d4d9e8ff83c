//! Eviction integration tests: tempdir storage root against a real Redis
//! instance reached via `REDIS_URL`.

use framecache_eviction::{EvictionConfig, EvictionEngine, STORAGE_USED_KEY};
use framecache_kv::KvClient;
use framecache_models::VideoId;
use framecache_queue::JobQueue;
use framecache_storage::ThumbnailStore;

async fn connect() -> KvClient {
    dotenvy::dotenv().ok();
    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    KvClient::connect(&redis_url).await.expect("connect to redis")
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn cleanup_enqueue_is_idempotent_while_a_cleanup_job_is_in_flight() {
    let dir = tempfile::tempdir().expect("tempdir");
    let kv = connect().await;
    let queue = JobQueue::new(&kv);
    let store = ThumbnailStore::new(dir.path(), kv.clone());
    let engine = EvictionEngine::new(kv, store, queue.clone(), EvictionConfig::default());

    engine.enqueue_cleanup().await.expect("enqueue cleanup");
    let job_id = framecache_models::JobId::cleanup();
    let first = queue.fetch_job(&job_id).await.expect("fetch").expect("present");

    engine.enqueue_cleanup().await.expect("enqueue cleanup again");
    let second = queue.fetch_job(&job_id).await.expect("fetch").expect("present");

    assert_eq!(first.queued_at, second.queued_at);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn run_cleanup_pass_evicts_lowest_score_video_when_over_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let kv = connect().await;
    let queue = JobQueue::new(&kv);
    let store = ThumbnailStore::new(dir.path(), kv.clone());

    let old_video = VideoId::parse("jNQXAC9IVRw").expect("valid videoID");
    let new_video = VideoId::parse("dQw4w9WgXcQ").expect("valid videoID");
    for video_id in [&old_video, &new_video] {
        store.ensure_video_dir(video_id).await.expect("create dir");
        let path = store.image_path(video_id, 0.0, false);
        store.write_image(&path, &vec![1u8; 4096]).await.expect("write image");
        store.touch_last_used(video_id).await;
    }

    let config = EvictionConfig {
        max_size: 4096,
        cleanup_multiplier: 0.5,
        redis_offset_allowed: 10,
    };
    let engine = EvictionEngine::new(kv.clone(), store.clone(), queue, config);
    engine.run_cleanup_pass().await.expect("run cleanup pass");

    let storage_used: u64 = kv
        .get(STORAGE_USED_KEY)
        .await
        .expect("get")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    assert!(storage_used <= config.target());
}
