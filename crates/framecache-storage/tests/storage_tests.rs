//! Storage integration tests: isolated tempdir storage root against a real
//! Redis instance reached via `REDIS_URL`.

use framecache_kv::KvClient;
use framecache_models::VideoId;
use framecache_storage::ThumbnailStore;

async fn connect() -> KvClient {
    dotenvy::dotenv().ok();
    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    KvClient::connect(&redis_url).await.expect("connect to redis")
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn write_then_read_round_trips_bytes_and_touches_last_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    let kv = connect().await;
    let store = ThumbnailStore::new(dir.path(), kv.clone());

    let video_id = VideoId::parse("jNQXAC9IVRw").expect("valid videoID");
    store.ensure_video_dir(&video_id).await.expect("create dir");

    let path = store.image_path(&video_id, 0.0, false);
    store.write_image(&path, b"not really webp but > MIN_IMAGE_BYTES................").await.expect("write image");

    let read = store
        .read_image(&video_id, 0.0, false)
        .await
        .expect("read image")
        .expect("image present");
    assert!(!read.bytes.is_empty());
    assert!(read.title.is_none());

    let scores = kv
        .zrange_with_scores("last-used", 0, -1)
        .await
        .expect("zrange last-used");
    assert!(scores.iter().any(|(member, _)| member == video_id.as_str()));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn zero_byte_image_is_reported_as_a_miss() {
    let dir = tempfile::tempdir().expect("tempdir");
    let kv = connect().await;
    let store = ThumbnailStore::new(dir.path(), kv);

    let video_id = VideoId::parse("jNQXAC9IVRw").expect("valid videoID");
    store.ensure_video_dir(&video_id).await.expect("create dir");
    let path = store.image_path(&video_id, 5.0, false);
    store.write_image(&path, b"").await.expect("write empty image");

    let read = store.read_image(&video_id, 5.0, false).await.expect("read image");
    assert!(read.is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn locate_by_truncated_prefix_finds_higher_precision_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let kv = connect().await;
    let store = ThumbnailStore::new(dir.path(), kv);

    let video_id = VideoId::parse("jNQXAC9IVRw").expect("valid videoID");
    store.ensure_video_dir(&video_id).await.expect("create dir");
    let path = store.image_path(&video_id, 17.0234, false);
    store.write_image(&path, &vec![1u8; 512]).await.expect("write image");

    let found = store
        .locate_by_truncated_prefix(&video_id, 17.023)
        .await
        .expect("scan")
        .expect("match found");
    assert!((found - 17.0234).abs() < 1e-6);
}
