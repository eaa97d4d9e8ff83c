//! Two-priority job queue: a Redis LIST of job IDs per queue name, paired
//! with a HASH per job ID holding the record fields. A Streams consumer
//! group can't cheaply expose `position()` or `atFront`, so each queue is
//! plain `LPUSH`/`RPUSH`/`LPOS`/`LREM` on a list, with state transitions
//! applied via `HSET` and expiry enforced with `EXPIRE` on the hash key.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

use framecache_kv::KvClient;
use framecache_models::{JobId, JobRecord, JobState, QueueName, VideoId};

use crate::error::{QueueError, QueueResult};
use crate::job::EnqueueOptions;

/// Sorted set of started-but-not-finished job IDs, scored by start time, so
/// `reap_timed_out` can find jobs stuck past their `timeout_secs` without
/// scanning every job hash.
const STARTED_INDEX_KEY: &str = "jobs:started";

/// Fallback when a job hash somehow lacks a `timeout_secs` field.
const DEFAULT_RENDER_TIMEOUT_SECS: i64 = 30;

#[derive(Clone)]
pub struct JobQueue {
    conn: MultiplexedConnection,
}

impl JobQueue {
    pub fn new(kv: &KvClient) -> Self {
        Self {
            conn: kv.raw_connection(),
        }
    }

    fn list_key(queue: QueueName) -> String {
        format!("queue:{queue}")
    }

    fn hash_key(job_id: &JobId) -> String {
        format!("job:{job_id}")
    }

    fn record_to_fields(record: &JobRecord) -> Vec<(String, String)> {
        let mut fields = vec![
            ("video_id".to_string(), record.video_id.to_string()),
            ("time".to_string(), record.time.to_string()),
            ("is_livestream".to_string(), record.is_livestream.to_string()),
            (
                "update_accounting".to_string(),
                record.update_accounting.to_string(),
            ),
            ("queue".to_string(), record.queue.to_string()),
            ("state".to_string(), record.state.to_string()),
            ("queued_at".to_string(), record.queued_at.to_rfc3339()),
        ];
        if let Some(title) = &record.title {
            fields.push(("title".to_string(), title.clone()));
        }
        if let Some(started_at) = record.started_at {
            fields.push(("started_at".to_string(), started_at.to_rfc3339()));
        }
        if let Some(finished_at) = record.finished_at {
            fields.push(("finished_at".to_string(), finished_at.to_rfc3339()));
        }
        if let Some(reason) = &record.failure_reason {
            fields.push(("failure_reason".to_string(), reason.clone()));
        }
        fields
    }

    fn fields_to_record(job_id: &JobId, fields: HashMap<String, String>) -> QueueResult<JobRecord> {
        let video_id = fields
            .get("video_id")
            .ok_or_else(|| QueueError::CorruptRecord(format!("{job_id} missing video_id")))?;
        let video_id = VideoId::parse(video_id.clone())
            .map_err(|e| QueueError::CorruptRecord(format!("{job_id}: {e}")))?;
        let time: f64 = fields
            .get("time")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| QueueError::CorruptRecord(format!("{job_id} missing time")))?;
        let is_livestream = fields.get("is_livestream").map(|s| s == "true").unwrap_or(false);
        let update_accounting = fields
            .get("update_accounting")
            .map(|s| s == "true")
            .unwrap_or(false);
        let queue: QueueName = fields
            .get("queue")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| QueueError::CorruptRecord(format!("{job_id} missing queue")))?;
        let state: JobState = fields
            .get("state")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let queued_at = fields
            .get("queued_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let started_at = fields
            .get("started_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let finished_at = fields
            .get("finished_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(JobRecord {
            job_id: job_id.clone(),
            video_id,
            time,
            title: fields.get("title").cloned(),
            is_livestream,
            update_accounting,
            queue,
            state,
            queued_at,
            started_at,
            finished_at,
            failure_reason: fields.get("failure_reason").cloned(),
        })
    }

    /// Current record for `job_id`, regardless of which queue it was
    /// enqueued under. `None` if no live record exists.
    pub async fn fetch_job(&self, job_id: &JobId) -> QueueResult<Option<JobRecord>> {
        let mut conn = self.conn.clone();
        let key = Self::hash_key(job_id);
        let fields: HashMap<String, String> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::fields_to_record(job_id, fields)?))
    }

    /// Push `record` onto `queue` and write its hash. Callers are expected
    /// to have called `fetch_job` first to avoid duplicating a live record.
    pub async fn enqueue(
        &self,
        queue: QueueName,
        record: &JobRecord,
        opts: EnqueueOptions,
    ) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let list_key = Self::list_key(queue);
        let hash_key = Self::hash_key(&record.job_id);

        let mut fields = Self::record_to_fields(record);
        fields.push(("ttl_secs".to_string(), opts.ttl.as_secs().to_string()));
        fields.push((
            "failure_ttl_secs".to_string(),
            opts.failure_ttl.as_secs().to_string(),
        ));
        fields.push(("timeout_secs".to_string(), opts.timeout.as_secs().to_string()));

        let _: () = conn.hset_multiple(&hash_key, &fields).await?;
        if opts.at_front {
            let _: () = conn.lpush(&list_key, record.job_id.as_str()).await?;
        } else {
            let _: () = conn.rpush(&list_key, record.job_id.as_str()).await?;
        }
        debug!(job_id = %record.job_id, %queue, at_front = opts.at_front, "enqueued job");
        Ok(())
    }

    /// Remove a job's record and list entry. Callers should only do this
    /// while the job is `queued`; the caller is expected to check that via
    /// `fetch_job` first.
    pub async fn remove(&self, queue: QueueName, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let list_key = Self::list_key(queue);
        let hash_key = Self::hash_key(job_id);
        let _: i64 = conn.lrem(&list_key, 0, job_id.as_str()).await?;
        let _: () = conn.del(&hash_key).await?;
        Ok(())
    }

    /// Administrative drain: remove every queued job's hash and clear the list.
    pub async fn empty(&self, queue: QueueName) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let list_key = Self::list_key(queue);
        let job_ids: Vec<String> = conn.lrange(&list_key, 0, -1).await?;
        for id in &job_ids {
            let hash_key = Self::hash_key(&JobId::from_string(id.clone()));
            let _: () = conn.del(&hash_key).await?;
        }
        let _: () = conn.del(&list_key).await?;
        info!(%queue, drained = job_ids.len(), "cleared queue");
        Ok(())
    }

    /// 0-based index within the queued region, or `None` if the job has
    /// already been popped (started/finished/absent).
    pub async fn position(&self, queue: QueueName, job_id: &JobId) -> QueueResult<Option<i64>> {
        let mut conn = self.conn.clone();
        let list_key = Self::list_key(queue);
        let pos: Option<i64> = conn
            .lpos(&list_key, job_id.as_str(), redis::LposOptions::default())
            .await?;
        Ok(pos)
    }

    pub async fn len(&self, queue: QueueName) -> QueueResult<i64> {
        let mut conn = self.conn.clone();
        let len: i64 = conn.llen(&Self::list_key(queue)).await?;
        Ok(len)
    }

    pub async fn mark_started(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let hash_key = Self::hash_key(job_id);
        let now = Utc::now();
        let _: () = conn
            .hset_multiple(
                &hash_key,
                &[
                    ("state", JobState::Started.as_str()),
                    ("started_at", now.to_rfc3339().as_str()),
                ],
            )
            .await?;
        let _: () = conn
            .zadd(STARTED_INDEX_KEY, job_id.as_str(), now.timestamp() as f64)
            .await?;
        Ok(())
    }

    pub async fn mark_finished(&self, queue: QueueName, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let list_key = Self::list_key(queue);
        let hash_key = Self::hash_key(job_id);
        let now = Utc::now().to_rfc3339();
        let _: () = conn
            .hset_multiple(
                &hash_key,
                &[
                    ("state", JobState::Finished.as_str()),
                    ("finished_at", now.as_str()),
                ],
            )
            .await?;
        let ttl_secs: Option<String> = conn.hget(&hash_key, "ttl_secs").await?;
        if let Some(ttl) = ttl_secs.and_then(|s| s.parse::<i64>().ok()) {
            let _: () = conn.expire(&hash_key, ttl).await?;
        }
        let _: i64 = conn.lrem(&list_key, 0, job_id.as_str()).await?;
        let _: () = conn.zrem(STARTED_INDEX_KEY, job_id.as_str()).await?;
        Ok(())
    }

    pub async fn mark_failed(
        &self,
        queue: QueueName,
        job_id: &JobId,
        reason: &str,
    ) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let list_key = Self::list_key(queue);
        let hash_key = Self::hash_key(job_id);
        let now = Utc::now().to_rfc3339();
        let _: () = conn
            .hset_multiple(
                &hash_key,
                &[
                    ("state", JobState::Failed.as_str()),
                    ("finished_at", now.as_str()),
                    ("failure_reason", reason),
                ],
            )
            .await?;
        let failure_ttl_secs: Option<String> = conn.hget(&hash_key, "failure_ttl_secs").await?;
        if let Some(ttl) = failure_ttl_secs.and_then(|s| s.parse::<i64>().ok()) {
            let _: () = conn.expire(&hash_key, ttl).await?;
        }
        let _: i64 = conn.lrem(&list_key, 0, job_id.as_str()).await?;
        let _: () = conn.zrem(STARTED_INDEX_KEY, job_id.as_str()).await?;
        Ok(())
    }

    /// Mark any `started` job whose `timeout_secs` has elapsed as failed, so
    /// a hung render (wedged extractor child, dead worker process) doesn't
    /// stay `started` forever. Safe to call from multiple worker processes:
    /// a job already reaped (or otherwise no longer `started`) is just
    /// dropped from the started-index without being re-marked.
    pub async fn reap_timed_out(&self) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        let now = Utc::now().timestamp();
        let members: Vec<(String, f64)> = conn.zrange_withscores(STARTED_INDEX_KEY, 0, -1).await?;

        let mut reaped = 0;
        for (id, started_at) in members {
            let job_id = JobId::from_string(id.clone());
            let hash_key = Self::hash_key(&job_id);
            let timeout_secs: Option<String> = conn.hget(&hash_key, "timeout_secs").await?;
            let timeout_secs = timeout_secs
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS);

            if now - started_at as i64 <= timeout_secs {
                continue;
            }

            match self.fetch_job(&job_id).await? {
                Some(record) if record.state == JobState::Started => {
                    self.mark_failed(record.queue, &job_id, "render timed out").await?;
                    reaped += 1;
                }
                _ => {
                    let _: () = conn.zrem(STARTED_INDEX_KEY, &id).await?;
                }
            }
        }
        Ok(reaped)
    }

    /// Pop the head of the first non-empty queue in `queues` order and mark
    /// it started. Used by the worker harness's round-robin dequeue: callers
    /// rotate the order of `queues` between calls to alternate priority.
    pub async fn pop_round_robin(
        &self,
        queues: &[QueueName],
    ) -> QueueResult<Option<(QueueName, JobRecord)>> {
        for &queue in queues {
            let mut conn = self.conn.clone();
            let list_key = Self::list_key(queue);
            let popped: Option<String> = conn.lpop(&list_key, None).await?;
            if let Some(id) = popped {
                let job_id = JobId::from_string(id);
                self.mark_started(&job_id).await?;
                if let Some(record) = self.fetch_job(&job_id).await? {
                    return Ok(Some((queue, record)));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecache_models::JobId;

    #[test]
    fn list_and_hash_keys_are_namespaced_by_queue_and_job() {
        assert_eq!(JobQueue::list_key(QueueName::High), "queue:high");
        assert_eq!(JobQueue::list_key(QueueName::Default), "queue:default");
        let job_id = JobId::from_string("jNQXAC9IVRw-0.0");
        assert_eq!(JobQueue::hash_key(&job_id), "job:jNQXAC9IVRw-0.0");
    }

    #[test]
    fn fields_to_record_rejects_missing_video_id() {
        let job_id = JobId::from_string("jNQXAC9IVRw-0.0");
        let fields = HashMap::new();
        let result = JobQueue::fields_to_record(&job_id, fields);
        assert!(result.is_err());
    }
}
