//! Async Redis client: one multiplexed connection for request/response
//! commands, and a dedicated pub/sub connection per subscriber so a waiting
//! subscribe loop never blocks the response path.

use std::time::Duration;

use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::retry::{retry, RetryPolicy};

/// A live subscription to one pub/sub channel, established before the
/// triggering event (e.g. enqueue) is published, to avoid missing a
/// completion message that fires before `wait` is called.
pub struct Subscription {
    channel: String,
    stream: std::pin::Pin<Box<dyn futures_util::Stream<Item = String> + Send>>,
}

impl Subscription {
    /// Wait up to `timeout` for a payload; returns `None` on timeout.
    pub async fn wait(mut self, timeout: Duration) -> Option<String> {
        match tokio::time::timeout(timeout, self.stream.next()).await {
            Ok(Some(payload)) => Some(payload),
            Ok(None) => None,
            Err(_) => {
                debug!(channel = %self.channel, "subscription wait timed out");
                None
            }
        }
    }
}

#[derive(Clone)]
pub struct KvClient {
    client: redis::Client,
    conn: MultiplexedConnection,
    retry_policy: RetryPolicy,
}

impl KvClient {
    pub async fn connect(redis_url: &str) -> KvResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            client,
            conn,
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn retryable(err: &KvError) -> bool {
        err.is_transient()
    }

    pub async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let key = key.to_string();
        retry("kv.get", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            async move { conn.get(&key).await.map_err(KvError::from) }
        })
        .await
    }

    pub async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        retry("kv.set", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            let value = value.clone();
            async move { conn.set(&key, &value).await.map_err(KvError::from) }
        })
        .await
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> KvResult<i64> {
        let key = key.to_string();
        retry("kv.incr_by", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            async move { conn.incr(&key, delta).await.map_err(KvError::from) }
        })
        .await
    }

    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> KvResult<()> {
        let key = key.to_string();
        let member = member.to_string();
        retry("kv.zadd", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            let member = member.clone();
            async move {
                let _: () = conn.zadd(&key, &member, score).await?;
                Ok(())
            }
        })
        .await
    }

    pub async fn zrem(&self, key: &str, member: &str) -> KvResult<()> {
        let key = key.to_string();
        let member = member.to_string();
        retry("kv.zrem", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            let member = member.clone();
            async move {
                let _: () = conn.zrem(&key, &member).await?;
                Ok(())
            }
        })
        .await
    }

    /// Members in ascending-score order, with their scores.
    pub async fn zrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> KvResult<Vec<(String, f64)>> {
        let key = key.to_string();
        retry(
            "kv.zrange_with_scores",
            &self.retry_policy,
            Self::retryable,
            || {
                let mut conn = self.conn.clone();
                let key = key.clone();
                async move {
                    conn.zrange_withscores(&key, start, stop)
                        .await
                        .map_err(KvError::from)
                }
            },
        )
        .await
    }

    pub async fn zrank(&self, key: &str, member: &str) -> KvResult<Option<i64>> {
        let key = key.to_string();
        let member = member.to_string();
        retry("kv.zrank", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            let member = member.clone();
            async move { conn.zrank(&key, &member).await.map_err(KvError::from) }
        })
        .await
    }

    pub async fn zcard(&self, key: &str) -> KvResult<i64> {
        let key = key.to_string();
        retry("kv.zcard", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            async move { conn.zcard(&key).await.map_err(KvError::from) }
        })
        .await
    }

    pub async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> KvResult<Vec<String>> {
        let key = key.to_string();
        retry(
            "kv.zrangebyscore",
            &self.retry_policy,
            Self::retryable,
            || {
                let mut conn = self.conn.clone();
                let key = key.clone();
                async move { conn.zrangebyscore(&key, min, max).await.map_err(KvError::from) }
            },
        )
        .await
    }

    pub async fn expire(&self, key: &str, seconds: i64) -> KvResult<()> {
        let key = key.to_string();
        retry("kv.expire", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let key = key.clone();
            async move {
                let _: () = conn.expire(&key, seconds).await?;
                Ok(())
            }
        })
        .await
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> KvResult<()> {
        let channel = channel.to_string();
        let payload = payload.to_string();
        retry("kv.publish", &self.retry_policy, Self::retryable, || {
            let mut conn = self.conn.clone();
            let channel = channel.clone();
            let payload = payload.clone();
            async move {
                let _: () = conn.publish(&channel, &payload).await?;
                Ok(())
            }
        })
        .await
    }

    /// Open a dedicated pub/sub connection and subscribe before returning,
    /// so callers can enqueue work and only then `wait` without racing a
    /// publish that might otherwise happen before the subscription exists.
    pub async fn subscribe(&self, channel: &str) -> KvResult<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        let channel_owned = channel.to_string();
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() });
        Ok(Subscription {
            channel: channel_owned,
            stream: Box::pin(stream),
        })
    }

    /// Raw command access for operations (e.g. the job queue's LIST/HASH
    /// commands) that the typed surface above does not cover.
    pub fn raw_connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_defaults_match_spec() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.factor, 3.0);
    }
}
