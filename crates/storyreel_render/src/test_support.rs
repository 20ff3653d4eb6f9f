//! Fakes shared by the pipeline tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use storyreel_core::artifact::VideoArtifact;
use storyreel_core::layout::RawLayout;
use storyreel_core::types::{GenerationStatus, ImageRef, Page, SpeechRef, StoryWithPages, TimeUs};
use uuid::Uuid;

use crate::probe::Ffprobe;
use crate::storage::{
    ArtifactStore, JobSink, LayoutStore, LocalStorage, MediaProbe, MediaStorage, StoryStore,
};

pub fn page(number: u32, content: &str, image: Option<&str>, speech: Option<&str>) -> Page {
    Page {
        page_number: number,
        content: content.to_string(),
        default_image: image.map(|p| ImageRef { path: p.into() }),
        default_speech: speech.map(|p| SpeechRef {
            path: p.into(),
            status: GenerationStatus::Done,
        }),
    }
}

pub fn story(pages: Vec<Page>) -> StoryWithPages {
    StoryWithPages {
        id: Uuid::new_v4(),
        title: "The Fox".into(),
        settings: Default::default(),
        pages,
    }
}

/// Write an executable shell script standing in for ffmpeg or ffprobe.
#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Local storage with probes answered from a table instead of ffprobe.
pub struct FakeStorage {
    local: LocalStorage,
    clips: HashMap<PathBuf, f64>,
    delays: HashMap<PathBuf, Duration>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::rooted(std::env::temp_dir())
    }

    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            local: LocalStorage::new(root, Ffprobe::default()),
            clips: HashMap::new(),
            delays: HashMap::new(),
        }
    }

    pub fn with_clip(mut self, path: &str, seconds: f64) -> Self {
        self.clips.insert(path.into(), seconds);
        self
    }

    pub fn with_probe_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.into(), delay);
        self
    }
}

#[async_trait]
impl MediaStorage for FakeStorage {
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        self.local.read(path).await
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        self.local.write(path, bytes).await
    }

    async fn probe(&self, path: &Path) -> anyhow::Result<MediaProbe> {
        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        let seconds = self
            .clips
            .get(path)
            .ok_or_else(|| anyhow::anyhow!("no such clip: {}", path.display()))?;
        Ok(MediaProbe {
            duration: TimeUs::from_seconds(*seconds),
        })
    }

    fn media_path(&self, path: &Path) -> PathBuf {
        self.local.media_path(path)
    }

    fn resolve_output_path(&self, base_dir: &Path, filename: &str) -> PathBuf {
        self.local.resolve_output_path(base_dir, filename)
    }

    async fn staging_path(&self, final_path: &Path) -> anyhow::Result<PathBuf> {
        self.local.staging_path(final_path).await
    }

    async fn commit(&self, staged: &Path, final_path: &Path) -> anyhow::Result<()> {
        self.local.commit(staged, final_path).await
    }

    async fn discard(&self, staged: &Path) -> anyhow::Result<()> {
        self.local.discard(staged).await
    }
}

#[derive(Default)]
pub struct MemoryStories(pub Vec<StoryWithPages>);

#[async_trait]
impl StoryStore for MemoryStories {
    async fn get_story_with_pages(&self, id: Uuid) -> anyhow::Result<Option<StoryWithPages>> {
        Ok(self.0.iter().find(|s| s.id == id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryLayouts(pub HashMap<Uuid, RawLayout>);

#[async_trait]
impl LayoutStore for MemoryLayouts {
    async fn get_layout(&self, id: Uuid) -> anyhow::Result<Option<RawLayout>> {
        Ok(self.0.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryArtifacts {
    pub saved: Mutex<Vec<VideoArtifact>>,
    /// Reject saves whose status is `DONE`.
    pub fail_done: bool,
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn save(&self, artifact: &VideoArtifact) -> anyhow::Result<()> {
        if self.fail_done && artifact.status == storyreel_core::job::JobStatus::Done {
            anyhow::bail!("database is read-only");
        }
        self.saved.lock().unwrap().push(artifact.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<(String, String, Value)>>,
    pub marks: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect()
    }

    pub fn progress_values(&self) -> Vec<u64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, name, _)| name == "progress")
            .filter_map(|(_, _, payload)| payload["progress"].as_u64())
            .collect()
    }
}

#[async_trait]
impl JobSink for RecordingSink {
    async fn emit(&self, channel: &str, event: &str, payload: Value) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((channel.to_string(), event.to_string(), payload));
        Ok(())
    }

    async fn mark_in_progress(&self, _task_id: Uuid) -> anyhow::Result<()> {
        self.marks.lock().unwrap().push("in_progress".into());
        Ok(())
    }

    async fn mark_done(&self, _task_id: Uuid, _artifact: &VideoArtifact) -> anyhow::Result<()> {
        self.marks.lock().unwrap().push("done".into());
        Ok(())
    }

    async fn mark_failed(&self, _task_id: Uuid, error: &str) -> anyhow::Result<()> {
        self.marks.lock().unwrap().push(format!("failed: {error}"));
        Ok(())
    }
}
