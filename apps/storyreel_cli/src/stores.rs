//! File-backed collaborators for running a composition from disk.

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyreel_core::artifact::VideoArtifact;
use storyreel_core::layout::RawLayout;
use storyreel_core::types::StoryWithPages;
use storyreel_render::storage::{ArtifactStore, JobSink, LayoutStore, LocalStorage, MediaStorage, StoryStore};
use tracing::info;
use uuid::Uuid;

/// A single story read from a JSON file.
pub struct FileStoryStore {
    story: StoryWithPages,
}

impl FileStoryStore {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading story {}", path.display()))?;
        let story = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing story {}", path.display()))?;
        Ok(Self { story })
    }

    pub fn story_id(&self) -> Uuid {
        self.story.id
    }
}

#[async_trait]
impl StoryStore for FileStoryStore {
    async fn get_story_with_pages(&self, id: Uuid) -> anyhow::Result<Option<StoryWithPages>> {
        Ok((self.story.id == id).then(|| self.story.clone()))
    }
}

/// Layouts stored as `<dir>/<layout id>.json`.
pub struct DirLayoutStore {
    dir: Option<PathBuf>,
}

impl DirLayoutStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl LayoutStore for DirLayoutStore {
    async fn get_layout(&self, id: Uuid) -> anyhow::Result<Option<RawLayout>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let path = dir.join(format!("{id}.json"));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading layout {}", path.display())),
        };
        let layout = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing layout {}", path.display()))?;
        Ok(Some(layout))
    }
}

/// Writes each record as `<video>.json` next to the video, or
/// `<dir>/<video id>.json` when there is no video.
pub struct JsonArtifactStore {
    storage: Arc<LocalStorage>,
    dir: PathBuf,
}

impl JsonArtifactStore {
    pub fn new(storage: Arc<LocalStorage>, dir: PathBuf) -> Self {
        Self { storage, dir }
    }

    pub fn record_path(&self, artifact: &VideoArtifact) -> PathBuf {
        match &artifact.path {
            Some(video) => video.with_extension("json"),
            None => self.dir.join(format!("{}.json", artifact.id)),
        }
    }
}

#[async_trait]
impl ArtifactStore for JsonArtifactStore {
    async fn save(&self, artifact: &VideoArtifact) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(artifact)?;
        self.storage.write(&self.record_path(artifact), &bytes).await
    }
}

/// Reports lifecycle through the log.
pub struct LogSink;

#[async_trait]
impl JobSink for LogSink {
    async fn emit(&self, channel: &str, event: &str, payload: Value) -> anyhow::Result<()> {
        info!(channel, event, %payload, "event");
        Ok(())
    }

    async fn mark_in_progress(&self, task_id: Uuid) -> anyhow::Result<()> {
        info!(%task_id, "task in progress");
        Ok(())
    }

    async fn mark_done(&self, task_id: Uuid, artifact: &VideoArtifact) -> anyhow::Result<()> {
        let path = artifact.path.as_deref().map(|p| p.display().to_string());
        info!(%task_id, path = path.as_deref().unwrap_or(""), "task done");
        Ok(())
    }

    async fn mark_failed(&self, task_id: Uuid, error: &str) -> anyhow::Result<()> {
        info!(%task_id, error, "task failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_core::settings::StorySettings;
    use storyreel_render::probe::Ffprobe;

    #[tokio::test]
    async fn story_store_answers_only_its_story() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.json");
        let id = Uuid::new_v4();
        std::fs::write(
            &path,
            format!(r#"{{ "id": "{id}", "title": "T", "pages": [ {{ "pageNumber": 1, "content": "Hi" }} ] }}"#),
        )
        .unwrap();

        let store = FileStoryStore::load(&path).await.unwrap();
        assert_eq!(store.story_id(), id);
        assert!(store.get_story_with_pages(id).await.unwrap().is_some());
        assert!(store.get_story_with_pages(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn layouts_are_looked_up_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        std::fs::write(dir.path().join(format!("{id}.json")), r#"{ "items": [ { "kind": "image" } ] }"#).unwrap();

        let store = DirLayoutStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(store.get_layout(id).await.unwrap().unwrap().items.len(), 1);
        assert!(store.get_layout(Uuid::new_v4()).await.unwrap().is_none());
        assert!(DirLayoutStore::new(None).get_layout(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn artifact_is_written_next_to_video() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path(), Ffprobe::default()));
        let store = JsonArtifactStore::new(storage, dir.path().join("videos"));

        let mut artifact =
            VideoArtifact::started(Uuid::new_v4(), Uuid::new_v4(), "T", &StorySettings::default());
        artifact.path = Some(dir.path().join("videos/video_1.mp4"));
        store.save(&artifact).await.unwrap();

        let written = std::fs::read(dir.path().join("videos/video_1.json")).unwrap();
        let back: VideoArtifact = serde_json::from_slice(&written).unwrap();
        assert_eq!(back.id, artifact.id);

        artifact.path = None;
        assert_eq!(
            store.record_path(&artifact),
            dir.path().join(format!("videos/{}.json", artifact.id))
        );
    }
}
