//! Bounded exponential-backoff retry wrapper.
//!
//! Every sensitive KV operation (reading the oldest video, publishing
//! completion, updating the last-used index) goes through [`retry`] so the
//! 5-attempt/0.1s-base/factor-3 policy with full jitter is applied once,
//! here, instead of being copy-pasted at each call site.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{error, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            factor: 3.0,
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ceiling = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(ceiling * jitter_fraction())
    }
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

/// Run `f` up to `policy.max_attempts` times, sleeping with full jitter
/// between attempts. Only retries errors for which `is_retryable` returns
/// true; a non-retryable error returns immediately.
pub async fn retry<T, E, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !is_retryable(&err) || attempt >= policy.max_attempts {
                    error!(operation, attempt, error = %err, "kv operation retries exhausted");
                    metrics::counter!("framecache_kv_retry_exhausted_total", "operation" => operation.to_string())
                        .increment(1);
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying kv operation after transient error"
                );
                metrics::counter!("framecache_kv_retry_total", "operation" => operation.to_string())
                    .increment(1);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            "test",
            &RetryPolicy::default(),
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            factor: 1.0,
        };
        let result: Result<u32, &str> = retry(
            "test",
            &policy,
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            },
        )
        .await;
        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            "test",
            &RetryPolicy::default(),
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("permanent") }
            },
        )
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
