use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::job::JobStatus;
use crate::layout::{LayoutElement, LayoutSource};
use crate::settings::StorySettings;
use crate::types::Resolution;

/// Persisted description of a composed video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoArtifact {
    pub id: Uuid,
    pub story_id: Uuid,
    pub title: String,
    pub path: Option<PathBuf>,
    pub status: JobStatus,
    pub duration: Option<f64>,
    pub page_count: usize,
    pub settings: StorySettings,
    pub layout_used: Vec<LayoutElement>,
    pub layout_source: Option<LayoutSource>,
    pub resolution: Resolution,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_durations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

impl VideoArtifact {
    /// An in-progress record for a story about to be composed.
    pub fn started(video_id: Uuid, story_id: Uuid, title: &str, settings: &StorySettings) -> Self {
        Self {
            id: video_id,
            story_id,
            title: title.to_string(),
            path: None,
            status: JobStatus::InProgress,
            duration: None,
            page_count: 0,
            settings: settings.clone(),
            layout_used: Vec::new(),
            layout_source: None,
            resolution: settings.video.resolution(),
            metadata: ArtifactMetadata::default(),
            updated_at: Utc::now(),
        }
    }

    /// Turn this record into a failure record: path and title cleared, error stamped.
    pub fn mark_failed(&mut self, error: &str) {
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.path = None;
        self.title.clear();
        self.duration = None;
        self.metadata.error = Some(error.to_string());
        self.metadata.failed_at = Some(now);
        self.updated_at = now;
    }
}
