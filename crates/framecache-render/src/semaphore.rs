//! Concurrent-render admission: a crude semaphore over a Redis sorted set.
//! Workers add themselves before rendering, back off while the set is over
//! capacity, and remove themselves (or let a stale sweep reap them) when done.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tracing::debug;

use framecache_kv::KvClient;

pub const CONCURRENT_RENDERS_KEY: &str = "concurrent_renders";
const STALE_AFTER_SECS: i64 = 60;
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Admission ticket for the `concurrent_renders` set. Not `Drop`-based
/// cleanup since removal is an async call; callers invoke `release`
/// explicitly once the render completes.
pub struct RenderAdmission {
    member: String,
}

impl RenderAdmission {
    /// Add `member` to the concurrent-render set and block until its
    /// cardinality is within `max_concurrent`, sweeping stale entries
    /// roughly once a second while waiting.
    pub async fn acquire(kv: &KvClient, member: String, max_concurrent: i64) -> Result<Self, framecache_kv::KvError> {
        kv.zadd(CONCURRENT_RENDERS_KEY, &member, Utc::now().timestamp() as f64).await?;

        let mut last_sweep = Utc::now();
        loop {
            if Utc::now().signed_duration_since(last_sweep).num_milliseconds() >= SWEEP_INTERVAL.as_millis() as i64 {
                sweep_stale(kv).await?;
                last_sweep = Utc::now();
            }

            let count = kv.zcard(CONCURRENT_RENDERS_KEY).await?;
            if count <= max_concurrent {
                break;
            }

            let backoff_ms = 100 + (jitter_fraction() * 50.0) as u64;
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }

        Ok(Self { member })
    }

    pub async fn release(self, kv: &KvClient) -> Result<(), framecache_kv::KvError> {
        kv.zrem(CONCURRENT_RENDERS_KEY, &self.member).await
    }
}

async fn sweep_stale(kv: &KvClient) -> Result<(), framecache_kv::KvError> {
    let cutoff = (Utc::now().timestamp() - STALE_AFTER_SECS) as f64;
    let stale = kv.zrangebyscore(CONCURRENT_RENDERS_KEY, f64::MIN, cutoff).await?;
    for member in stale {
        debug!(member, "sweeping stale concurrent-render entry");
        kv.zrem(CONCURRENT_RENDERS_KEY, &member).await?;
    }
    Ok(())
}

pub fn admission_member(video_id: &str, time: f64, is_livestream: bool) -> String {
    format!("{video_id} {time} {is_livestream}")
}

/// Uniform [0, 1) jitter fraction, sourced from wall-clock sub-second
/// precision rather than a dependency on `rand`.
fn jitter_fraction() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1_000_000) as f64 / 1_000_000.0
}
