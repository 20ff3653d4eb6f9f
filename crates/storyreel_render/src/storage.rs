//! Collaborator interfaces the pipeline consumes, and local-disk implementations.
//!
//! The pipeline never touches a database or a queue directly. It reads stories
//! and layouts through [`StoryStore`] and [`LayoutStore`], media through
//! [`MediaStorage`], records results through [`ArtifactStore`], and reports
//! lifecycle through [`JobSink`]. Implementations report their own failures as
//! `anyhow::Error`; the orchestrator classifies them.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use storyreel_core::artifact::VideoArtifact;
use storyreel_core::layout::RawLayout;
use storyreel_core::types::{StoryWithPages, TimeUs};
use tracing::debug;
use uuid::Uuid;

use crate::probe::Ffprobe;

#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn get_story_with_pages(&self, id: Uuid) -> anyhow::Result<Option<StoryWithPages>>;
}

#[async_trait]
pub trait LayoutStore: Send + Sync {
    async fn get_layout(&self, id: Uuid) -> anyhow::Result<Option<RawLayout>>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaProbe {
    pub duration: TimeUs,
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Write `bytes` so readers never observe a partial file.
    async fn write(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()>;

    async fn probe(&self, path: &Path) -> anyhow::Result<MediaProbe>;

    /// Path on the local filesystem the encoder can open for a stored media reference.
    fn media_path(&self, path: &Path) -> PathBuf;

    fn resolve_output_path(&self, base_dir: &Path, filename: &str) -> PathBuf;

    /// Where the encoder should write before the output is committed to `final_path`.
    async fn staging_path(&self, final_path: &Path) -> anyhow::Result<PathBuf>;

    async fn commit(&self, staged: &Path, final_path: &Path) -> anyhow::Result<()>;

    async fn discard(&self, staged: &Path) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(&self, artifact: &VideoArtifact) -> anyhow::Result<()>;
}

#[async_trait]
pub trait JobSink: Send + Sync {
    /// Fire-and-forget notification.
    async fn emit(&self, channel: &str, event: &str, payload: Value) -> anyhow::Result<()>;

    async fn mark_in_progress(&self, task_id: Uuid) -> anyhow::Result<()>;

    async fn mark_done(&self, task_id: Uuid, artifact: &VideoArtifact) -> anyhow::Result<()>;

    async fn mark_failed(&self, task_id: Uuid, error: &str) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// LocalStorage
// ---------------------------------------------------------------------------

/// Media on the local filesystem. Relative media paths resolve against `media_root`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    media_root: PathBuf,
    ffprobe: Ffprobe,
}

impl LocalStorage {
    pub fn new(media_root: impl Into<PathBuf>, ffprobe: Ffprobe) -> Self {
        Self {
            media_root: media_root.into(),
            ffprobe,
        }
    }
}

#[async_trait]
impl MediaStorage for LocalStorage {
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        Ok(tokio::fs::read(self.media_path(path)).await?)
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        let target = self.media_path(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = sibling(&target, "tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }

    async fn probe(&self, path: &Path) -> anyhow::Result<MediaProbe> {
        let probe = self.ffprobe.probe_audio(&self.media_path(path)).await?;
        debug!(
            path = %path.display(),
            duration = %probe.duration,
            codec = probe.codec.as_deref().unwrap_or("unknown"),
            channels = ?probe.channels,
            sample_rate = ?probe.sample_rate,
            "probed narration"
        );
        Ok(MediaProbe {
            duration: probe.duration,
        })
    }

    fn media_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_root.join(path)
        }
    }

    fn resolve_output_path(&self, base_dir: &Path, filename: &str) -> PathBuf {
        self.media_path(base_dir).join(filename)
    }

    async fn staging_path(&self, final_path: &Path) -> anyhow::Result<PathBuf> {
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(sibling(final_path, "partial"))
    }

    async fn commit(&self, staged: &Path, final_path: &Path) -> anyhow::Result<()> {
        tokio::fs::rename(staged, final_path).await?;
        debug!(path = %final_path.display(), "committed output");
        Ok(())
    }

    async fn discard(&self, staged: &Path) -> anyhow::Result<()> {
        match tokio::fs::remove_file(staged).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Hidden file next to `path` that keeps its extension, so ffmpeg still picks
/// the container from the name: `out/v.mp4` -> `out/.v.partial.mp4`.
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!(".{stem}.{tag}.{}", ext.to_string_lossy()),
        None => format!(".{stem}.{tag}"),
    };
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
