//! Size-triggered LRU cleanup: a counter-guided pass against the `last-used`
//! index, a filesystem reconciliation pass that restores `storage-used` to
//! ground truth, and a final ground-truth eviction pass if reconciliation
//! still finds the root over target.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use framecache_kv::KvClient;
use framecache_models::VideoId;
use framecache_queue::{EnqueueOptions, JobQueue};
use framecache_storage::{ThumbnailStore, LAST_USED_KEY};

use crate::config::EvictionConfig;
use crate::error::EvictionResult;
use crate::fs_scan;

pub const STORAGE_USED_KEY: &str = "storage-used";
pub const LAST_STORAGE_CHECK_KEY: &str = "last-storage-check";

/// Sentinel videoID for the cleanup job itself, which isn't keyed by a
/// real video. 11 characters to satisfy the same token shape as a real ID.
const CLEANUP_SENTINEL_VIDEO_ID: &str = "cleanup____";

const CLEANUP_CHECK_INTERVAL: i64 = 30 * 60;

#[derive(Clone)]
pub struct EvictionEngine {
    kv: KvClient,
    storage: ThumbnailStore,
    queue: JobQueue,
    config: EvictionConfig,
}

struct LoopOutcome {
    saved: u64,
}

impl EvictionEngine {
    pub fn new(kv: KvClient, storage: ThumbnailStore, queue: JobQueue, config: EvictionConfig) -> Self {
        Self {
            kv,
            storage,
            queue,
            config,
        }
    }

    /// Call after every successful render. Enqueues a cleanup job if
    /// `storage-used` exceeds `max_size` or the last check is stale.
    pub async fn check_if_cleanup_needed(&self) -> EvictionResult<()> {
        let storage_used = self.read_storage_used().await?;
        let last_check: i64 = self
            .kv
            .get(LAST_STORAGE_CHECK_KEY)
            .await?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let now = Utc::now().timestamp();

        if storage_used > self.config.max_size || now - last_check > CLEANUP_CHECK_INTERVAL {
            self.enqueue_cleanup().await?;
        }
        Ok(())
    }

    async fn read_storage_used(&self) -> EvictionResult<u64> {
        Ok(self
            .kv
            .get(STORAGE_USED_KEY)
            .await?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0))
    }

    /// Enqueue `cleanup` at the front of `high`, refusing if one is already
    /// queued or started. A stale finished/failed record is removed first.
    pub async fn enqueue_cleanup(&self) -> EvictionResult<()> {
        use framecache_models::{JobId, JobRecord, JobState, QueueName};

        let job_id = JobId::cleanup();
        if let Some(existing) = self.queue.fetch_job(&job_id).await? {
            if matches!(existing.state, JobState::Queued | JobState::Started) {
                return Ok(());
            }
            self.queue.remove(existing.queue, &job_id).await?;
        }

        let cleanup_video_id = VideoId::parse(CLEANUP_SENTINEL_VIDEO_ID)
            .expect("cleanup sentinel videoID is a valid 11-char token");
        let record = JobRecord::new(cleanup_video_id, 0.0, None, false, false, QueueName::High);
        let opts = EnqueueOptions::new(
            Duration::from_secs(300),
            Duration::from_secs(500),
            Duration::from_secs(60),
        )
        .at_front(true);
        self.queue.enqueue(QueueName::High, &record, opts).await?;
        info!("enqueued cleanup job");
        Ok(())
    }

    /// Run the full cleanup pass: counter-guided eviction, filesystem
    /// reconciliation with corrupt-file deletion, counter repair, then a
    /// ground-truth eviction pass if the reconciled size is still over target.
    pub async fn run_cleanup_pass(&self) -> EvictionResult<()> {
        let target = self.config.target();

        let before_counter = self.read_storage_used().await?;
        if before_counter > target {
            let outcome = self.eviction_loop(before_counter, None).await?;
            info!(saved = outcome.saved, "counter-guided pass evicted");
        }

        let scan = fs_scan::scan_and_reconcile(self.storage.root()).await?;

        let after_counter = self.read_storage_used().await?;
        let diff = after_counter as i64 - before_counter as i64;
        let reconciled = scan.folder_size + diff.max(0) as u64;
        self.write_storage_used(reconciled).await?;
        self.kv
            .set(LAST_STORAGE_CHECK_KEY, &Utc::now().timestamp().to_string())
            .await?;

        if scan.folder_size > target {
            let outcome = self
                .eviction_loop(scan.folder_size, Some(scan.file_count))
                .await?;
            let updated = reconciled.saturating_sub(outcome.saved);
            self.write_storage_used(updated).await?;
            info!(saved = outcome.saved, "ground-truth pass evicted");
        }

        Ok(())
    }

    async fn write_storage_used(&self, value: u64) -> EvictionResult<()> {
        self.kv.set(STORAGE_USED_KEY, &value.to_string()).await?;
        Ok(())
    }

    /// Evict until `folder_size - saved <= target`. When `file_count` is
    /// known and drifts from the last-used index by more than
    /// `redis_offset_allowed`, an orphan sweep runs first (directories on
    /// disk but absent from the index); otherwise victims are chosen as the
    /// lowest-score `last-used` member.
    async fn eviction_loop(&self, folder_size: u64, file_count: Option<u64>) -> EvictionResult<LoopOutcome> {
        let target = self.config.target();
        let mut saved: u64 = 0;

        if folder_size <= target {
            return Ok(LoopOutcome { saved });
        }

        let last_used_count = self.kv.zcard(LAST_USED_KEY).await?;

        let run_orphan_sweep = match file_count {
            Some(fc) => fc as i64 - last_used_count > self.config.redis_offset_allowed,
            None => false,
        };

        if run_orphan_sweep {
            let indexed: HashSet<String> = self
                .kv
                .zrange_with_scores(LAST_USED_KEY, 0, -1)
                .await?
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            let on_disk = fs_scan::list_video_dirs(self.storage.root()).await?;
            for video_id_str in on_disk {
                if folder_size.saturating_sub(saved) <= target {
                    break;
                }
                if indexed.contains(&video_id_str) {
                    continue;
                }
                if let Ok(video_id) = VideoId::parse(video_id_str.clone()) {
                    let dir = self.storage.video_dir(&video_id);
                    let size = fs_scan::dir_size(&dir).await.unwrap_or(0);
                    fs_scan::remove_dir(&dir).await?;
                    saved += size;
                    warn!(video_id = %video_id_str, size, "orphan sweep evicted directory absent from last-used index");
                }
            }
        }

        while folder_size.saturating_sub(saved) > target {
            let oldest = self.kv.zrange_with_scores(LAST_USED_KEY, 0, 0).await?;
            let Some((video_id_str, _)) = oldest.into_iter().next() else {
                break;
            };
            match VideoId::parse(video_id_str.clone()) {
                Ok(video_id) => {
                    let dir = self.storage.video_dir(&video_id);
                    let size = fs_scan::dir_size(&dir).await.unwrap_or(0);
                    fs_scan::remove_dir(&dir).await?;
                    self.kv.zrem(LAST_USED_KEY, &video_id_str).await?;
                    saved += size;
                    info!(video_id = %video_id_str, size, "evicted lowest-score video");
                }
                Err(_) => {
                    // Corrupt index entry: drop it so the loop can't spin forever.
                    self.kv.zrem(LAST_USED_KEY, &video_id_str).await?;
                }
            }
        }

        Ok(LoopOutcome { saved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_sentinel_is_a_valid_video_id() {
        assert!(VideoId::parse(CLEANUP_SENTINEL_VIDEO_ID).is_ok());
    }
}
