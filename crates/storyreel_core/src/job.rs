//! Composition job lifecycle.
//!
//! A job moves `Pending -> InProgress -> {Done | Failed}`. `Done` and `Failed`
//! are terminal. Every transition goes through a method on [`CompositionJob`],
//! which rejects anything outside that graph.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompositionJob {
    pub task_id: Uuid,
    pub story_id: Uuid,
    pub video_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub path: Option<PathBuf>,
    /// Measured output duration in seconds.
    pub duration: Option<f64>,
    pub error: Option<String>,
}

impl CompositionJob {
    pub fn new(task_id: Uuid, story_id: Uuid, video_id: Uuid) -> Self {
        Self {
            task_id,
            story_id,
            video_id,
            status: JobStatus::Pending,
            progress: 0,
            path: None,
            duration: None,
            error: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(JobStatus::InProgress)
    }

    /// Record encoder progress. Returns `true` when the stored value changed.
    pub fn set_progress(&mut self, percent: u8) -> Result<bool> {
        if self.status != JobStatus::InProgress {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: JobStatus::InProgress,
            });
        }
        let percent = percent.min(100);
        if percent == self.progress {
            return Ok(false);
        }
        self.progress = percent;
        Ok(true)
    }

    pub fn complete(&mut self, path: PathBuf, duration: f64) -> Result<()> {
        self.transition(JobStatus::Done)?;
        self.progress = 100;
        self.path = Some(path);
        self.duration = Some(duration);
        Ok(())
    }

    /// Fail from any non-terminal state. The path is cleared.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.path = None;
        self.error = Some(error.into());
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Done)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::Failed)
        );
        if !allowed {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Lifecycle notifications emitted to the job sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Started,
    Progress,
    Done,
    Failed,
}

impl JobEvent {
    pub fn name(self) -> &'static str {
        match self {
            JobEvent::Started => "in-progress",
            JobEvent::Progress => "progress",
            JobEvent::Done => "done",
            JobEvent::Failed => "failed",
        }
    }

    pub fn payload(self, job: &CompositionJob) -> Value {
        match self {
            JobEvent::Started => json!({
                "taskId": job.task_id,
                "storyId": job.story_id,
                "videoId": job.video_id,
                "status": job.status,
            }),
            JobEvent::Progress => json!({
                "taskId": job.task_id,
                "videoId": job.video_id,
                "progress": job.progress,
            }),
            JobEvent::Done => json!({
                "taskId": job.task_id,
                "storyId": job.story_id,
                "videoId": job.video_id,
                "status": job.status,
                "path": job.path,
                "duration": job.duration,
            }),
            JobEvent::Failed => json!({
                "taskId": job.task_id,
                "storyId": job.story_id,
                "videoId": job.video_id,
                "status": job.status,
                "error": job.error,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> CompositionJob {
        CompositionJob::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn happy_path() {
        let mut j = job();
        assert_eq!(j.status, JobStatus::Pending);
        j.start().unwrap();
        assert!(j.set_progress(40).unwrap());
        assert!(!j.set_progress(40).unwrap());
        j.complete(PathBuf::from("/out/v.mp4"), 9.0).unwrap();
        assert_eq!(j.status, JobStatus::Done);
        assert_eq!(j.progress, 100);
        assert!(j.status.is_terminal());
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let mut j = job();
        j.start().unwrap();
        j.fail("boom").unwrap();
        assert!(matches!(
            j.start(),
            Err(CoreError::InvalidTransition { from: JobStatus::Failed, .. })
        ));
        assert!(j.fail("again").is_err());
        assert!(j.complete(PathBuf::from("/x"), 1.0).is_err());
        assert_eq!(j.error.as_deref(), Some("boom"));
    }

    #[test]
    fn cannot_complete_before_start() {
        let mut j = job();
        assert!(j.complete(PathBuf::from("/x"), 1.0).is_err());
        assert!(j.set_progress(10).is_err());
        j.fail("story missing").unwrap();
        assert_eq!(j.status, JobStatus::Failed);
    }

    #[test]
    fn progress_is_clamped() {
        let mut j = job();
        j.start().unwrap();
        j.set_progress(250).unwrap();
        assert_eq!(j.progress, 100);
    }

    #[test]
    fn status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(JobStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn progress_payload_shape() {
        let mut j = job();
        j.start().unwrap();
        j.set_progress(50).unwrap();
        let payload = JobEvent::Progress.payload(&j);
        assert_eq!(payload["progress"], 50);
        assert_eq!(payload["taskId"], j.task_id.to_string());
        assert!(payload.get("error").is_none());
    }
}
