//! Job record and queue-name models shared by the queue and worker crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::VideoId;

/// `jobID = "<videoID>-<time>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn for_render(video_id: &VideoId, time: f64) -> Self {
        Self(format!("{}-{}", video_id, format_time(time)))
    }

    /// The dedicated high-priority cleanup job is not keyed by a video.
    pub fn cleanup() -> Self {
        Self("cleanup".to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render `time` the way it is embedded in job IDs and on-disk filenames:
/// full precision, no trailing `.0` artifacts introduced by formatting.
pub fn format_time(time: f64) -> String {
    if time.fract() == 0.0 && time.is_finite() {
        format!("{:.1}", time)
    } else {
        let mut s = format!("{}", time);
        if !s.contains('.') {
            s.push_str(".0");
        }
        s
    }
}

/// Lifecycle state of a job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Started => "started",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "started" => Ok(JobState::Started),
            "finished" => Ok(JobState::Finished),
            "failed" => Ok(JobState::Failed),
            _ => Err(()),
        }
    }
}

/// One of the two named priority queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    High,
    Default,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::High => "high",
            QueueName::Default => "default",
        }
    }

    /// The other queue, for cross-queue coalescing lookups.
    pub fn other(&self) -> QueueName {
        match self {
            QueueName::High => QueueName::Default,
            QueueName::Default => QueueName::High,
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(QueueName::High),
            "default" => Ok(QueueName::Default),
            _ => Err(()),
        }
    }
}

/// The record carried by a job hash: `(videoID, time, title?, isLivestream,
/// updateAccounting)` plus queue lifecycle bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub is_livestream: bool,
    pub update_accounting: bool,
    pub queue: QueueName,
    pub state: JobState,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobRecord {
    pub fn new(
        video_id: VideoId,
        time: f64,
        title: Option<String>,
        is_livestream: bool,
        update_accounting: bool,
        queue: QueueName,
    ) -> Self {
        let job_id = JobId::for_render(&video_id, time);
        Self {
            job_id,
            video_id,
            time,
            title,
            is_livestream,
            update_accounting,
            queue,
            state: JobState::Queued,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            failure_reason: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.state == JobState::Started
    }

    pub fn is_finished(&self) -> bool {
        self.state == JobState::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.state == JobState::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_embeds_video_and_time() {
        let v = VideoId::parse("jNQXAC9IVRw").unwrap();
        assert_eq!(JobId::for_render(&v, 17.0).as_str(), "jNQXAC9IVRw-17.0");
        assert_eq!(JobId::for_render(&v, 0.0).as_str(), "jNQXAC9IVRw-0.0");
    }

    #[test]
    fn queue_other_is_involution() {
        assert_eq!(QueueName::High.other(), QueueName::Default);
        assert_eq!(QueueName::Default.other(), QueueName::High);
    }

    #[test]
    fn new_record_starts_queued() {
        let v = VideoId::parse("jNQXAC9IVRw").unwrap();
        let record = JobRecord::new(v, 17.0, None, false, true, QueueName::Default);
        assert_eq!(record.state, JobState::Queued);
        assert!(!record.is_started());
    }
}
