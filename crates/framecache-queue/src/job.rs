//! Queue-specific options. Job identity and lifecycle state live in
//! `framecache_models::job` and are shared with the render task and
//! dispatcher; this module only carries what a producer attaches at
//! enqueue time.

use std::time::Duration;

/// Options a producer attaches when enqueueing a job.
#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    /// Job timeout; the queue marks the job failed if it runs longer than this.
    pub timeout: Duration,
    /// How long a failed job's record is retained so callers can distinguish
    /// "failed" from "unknown".
    pub failure_ttl: Duration,
    /// How long a finished job's record is retained.
    pub ttl: Duration,
    /// Push to the head of the queue instead of the tail.
    pub at_front: bool,
}

impl EnqueueOptions {
    pub fn new(timeout: Duration, failure_ttl: Duration, ttl: Duration) -> Self {
        Self {
            timeout,
            failure_ttl,
            ttl,
            at_front: false,
        }
    }

    pub fn at_front(mut self, at_front: bool) -> Self {
        self.at_front = at_front;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_front_builder_toggles_flag() {
        let opts = EnqueueOptions::new(
            Duration::from_secs(30),
            Duration::from_secs(500),
            Duration::from_secs(60),
        )
        .at_front(true);
        assert!(opts.at_front);
    }
}
