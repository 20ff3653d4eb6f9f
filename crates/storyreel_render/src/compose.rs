//! Composition orchestrator: runs one story through the whole pipeline and
//! owns the job's lifecycle.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyreel_core::artifact::VideoArtifact;
use storyreel_core::fonts::FontBook;
use storyreel_core::job::{CompositionJob, JobEvent, JobStatus};
use storyreel_core::timing::FALLBACK_PAGE_DURATION;
use storyreel_core::types::{StoryWithPages, TimeUs};
use storyreel_core::CoreError;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::command::EncodeCommand;
use crate::durations;
use crate::encode::{configure_output, container_extension, Encoder, ProgressCallback};
use crate::error::{RenderError, Result};
use crate::filter;
use crate::inputs::register_all;
use crate::layout;
use crate::storage::{ArtifactStore, JobSink, LayoutStore, MediaStorage, StoryStore};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ComposeConfig {
    /// Directory, relative to storage, that receives finished videos.
    pub output_dir: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub fallback_page_duration: TimeUs,
    /// Channel lifecycle events are emitted on.
    pub event_channel: String,
    /// Extra directories of `.ttf`/`.otf` faces captions may name.
    pub font_dirs: Vec<PathBuf>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("videos"),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            fallback_page_duration: FALLBACK_PAGE_DURATION,
            event_channel: "video-generation".to_string(),
            font_dirs: Vec::new(),
        }
    }
}

impl ComposeConfig {
    /// Defaults overridden by `STORYREEL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup("STORYREEL_OUTPUT_DIR") {
            config.output_dir = dir.into();
        }
        if let Some(bin) = lookup("STORYREEL_FFMPEG") {
            config.ffmpeg = bin.into();
        }
        if let Some(bin) = lookup("STORYREEL_FFPROBE") {
            config.ffprobe = bin.into();
        }
        if let Some(secs) = lookup("STORYREEL_FALLBACK_PAGE_SECS") {
            let parsed: f64 = secs
                .trim()
                .parse()
                .ok()
                .filter(|s: &f64| s.is_finite() && *s > 0.0)
                .ok_or_else(|| {
                    CoreError::InvalidSettings(format!(
                        "STORYREEL_FALLBACK_PAGE_SECS must be a positive number, got '{secs}'"
                    ))
                })?;
            config.fallback_page_duration = TimeUs::try_from_seconds(parsed)?;
        }
        if let Some(channel) = lookup("STORYREEL_EVENT_CHANNEL") {
            config.event_channel = channel;
        }
        if let Some(dirs) = lookup("STORYREEL_FONT_DIRS") {
            config.font_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        Ok(config)
    }
}

/// `video_{YYYYMMDD}_{videoId}_{token}.{ext}`
pub fn output_filename(video_id: Uuid, codec: &str, date: DateTime<Utc>) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "video_{}_{}_{}.{}",
        date.format("%Y%m%d"),
        video_id,
        &token[..8],
        container_extension(codec)
    )
}

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Collaborators {
    pub stories: Arc<dyn StoryStore>,
    pub layouts: Arc<dyn LayoutStore>,
    pub storage: Arc<dyn MediaStorage>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub sink: Arc<dyn JobSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeRequest {
    pub task_id: Uuid,
    pub story_id: Uuid,
    pub video_id: Uuid,
}

/// Runs composition jobs. Shares nothing mutable between runs, so one
/// `Composer` can drive concurrent jobs.
pub struct Composer {
    collaborators: Collaborators,
    config: ComposeConfig,
    encoder: Encoder,
    fonts: FontBook,
}

struct Encoded {
    path: PathBuf,
    duration: f64,
}

impl Composer {
    /// Fails when a configured font directory cannot be read.
    pub fn new(collaborators: Collaborators, config: ComposeConfig) -> Result<Self> {
        let encoder = Encoder::new(&config.ffmpeg);
        let fonts = FontBook::with_dirs(&config.font_dirs)?;
        Ok(Self {
            collaborators,
            config,
            encoder,
            fonts,
        })
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Compose one video. On failure the job ends `FAILED`, a failure record is
    /// saved, and the error is returned so the caller's queue can decide on retries.
    pub async fn compose(
        &self,
        request: ComposeRequest,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<VideoArtifact> {
        let mut job = CompositionJob::new(request.task_id, request.story_id, request.video_id);
        let mut artifact = VideoArtifact::started(
            request.video_id,
            request.story_id,
            "",
            &Default::default(),
        );

        job.start()?;
        info!(task_id = %job.task_id, story_id = %job.story_id, video_id = %job.video_id, "composition started");
        self.notify(&job, JobEvent::Started).await;
        if let Err(e) = self.collaborators.sink.mark_in_progress(job.task_id).await {
            warn!(task_id = %job.task_id, error = %format!("{e:#}"), "failed to mark job in progress");
        }
        if let Err(e) = self.collaborators.artifacts.save(&artifact).await {
            warn!(video_id = %job.video_id, error = %format!("{e:#}"), "failed to save in-progress record");
        }

        let encoded = match self.run(&job, &mut artifact, cancel).await {
            Ok(encoded) => encoded,
            Err(e) => return Err(self.fail(&mut job, &mut artifact, e).await),
        };

        artifact.status = JobStatus::Done;
        artifact.path = Some(encoded.path.clone());
        artifact.duration = Some(encoded.duration);
        artifact.updated_at = Utc::now();

        if let Err(e) = self.collaborators.artifacts.save(&artifact).await {
            // The video exists; leave it in place.
            let err = RenderError::Persistence {
                path: encoded.path.clone(),
                reason: format!("{e:#}"),
            };
            return Err(self.fail(&mut job, &mut artifact, err).await);
        }

        job.complete(encoded.path, encoded.duration)?;
        info!(task_id = %job.task_id, video_id = %job.video_id, duration = encoded.duration, "composition done");
        if let Err(e) = self.collaborators.sink.mark_done(job.task_id, &artifact).await {
            warn!(task_id = %job.task_id, error = %format!("{e:#}"), "failed to mark job done");
        }
        self.notify(&job, JobEvent::Done).await;
        Ok(artifact)
    }

    async fn run(
        &self,
        job: &CompositionJob,
        artifact: &mut VideoArtifact,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Encoded> {
        let storage = self.collaborators.storage.as_ref();

        let story = self.load_story(job.story_id).await?;
        story.validate()?;
        let settings = &story.settings;
        let resolution = settings.video.resolution();

        artifact.title = story.title.clone();
        artifact.settings = settings.clone();
        artifact.resolution = resolution;
        artifact.page_count = story.pages.len();

        let resolved = layout::resolve(self.collaborators.layouts.as_ref(), &story).await;
        let scaled = resolved.scaled(resolution);
        artifact.layout_used = resolved.elements.clone();
        artifact.layout_source = Some(resolved.source);

        let pages = story.ordered_pages();
        let page_durations =
            durations::resolve_all(storage, &pages, self.config.fallback_page_duration).await?;
        let total = page_durations.total();
        artifact.metadata.page_durations = page_durations.to_seconds_strings();
        debug!(task_id = %job.task_id, pages = pages.len(), total = %total, "resolved page durations");

        let mut command = EncodeCommand::new();
        let inputs = register_all(&mut command, &pages, storage);
        let graph = filter::build(
            &pages,
            &scaled,
            settings,
            &page_durations,
            total,
            &inputs,
            &self.fonts,
        )?;
        let filter_string = graph.filter_string();
        debug!(task_id = %job.task_id, filter_graph = %filter_string, "filter graph");
        command.set_filter_graph(filter_string);
        command.limit_duration(total);
        configure_output(&mut command, settings, &graph.video_label, &graph.audio_label);

        let filename = output_filename(job.video_id, settings.video.codec(), Utc::now());
        let final_path = storage.resolve_output_path(&self.config.output_dir, &filename);
        let staged = storage
            .staging_path(&final_path)
            .await
            .map_err(|e| RenderError::Storage(format!("{e:#}")))?;

        let (progress_tx, forwarder) = self.forward_progress(job);
        let on_progress: ProgressCallback = Box::new(move |p| {
            let _ = progress_tx.send(p);
        });

        let result = self
            .encoder
            .execute(
                &command,
                &staged,
                total,
                settings.video.fps,
                &job.task_id.to_string(),
                Some(on_progress),
                cancel,
            )
            .await;
        // The callback (and its sender) is dropped by now; drain the forwarder.
        if let Err(e) = forwarder.await {
            warn!(task_id = %job.task_id, error = %e, "progress forwarder panicked");
        }

        let duration = match result {
            Ok(duration) => duration,
            Err(e) => {
                self.discard(&staged).await;
                return Err(e);
            }
        };

        if let Err(e) = storage.commit(&staged, &final_path).await {
            self.discard(&staged).await;
            return Err(RenderError::Storage(format!("{e:#}")));
        }

        Ok(Encoded {
            path: final_path,
            duration,
        })
    }

    async fn load_story(&self, story_id: Uuid) -> Result<StoryWithPages> {
        self.collaborators
            .stories
            .get_story_with_pages(story_id)
            .await
            .map_err(|e| RenderError::collaborator("story store", e))?
            .ok_or(RenderError::StoryNotFound(story_id))
    }

    /// Relay encoder progress to the sink. Only the latest value is kept.
    fn forward_progress(
        &self,
        job: &CompositionJob,
    ) -> (watch::Sender<u8>, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = watch::channel(0u8);
        let sink = Arc::clone(&self.collaborators.sink);
        let channel = self.config.event_channel.clone();
        let mut snapshot = job.clone();

        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let percent = *rx.borrow_and_update();
                if !matches!(snapshot.set_progress(percent), Ok(true)) {
                    continue;
                }
                let payload = JobEvent::Progress.payload(&snapshot);
                if let Err(e) = sink.emit(&channel, JobEvent::Progress.name(), payload).await {
                    debug!(error = %format!("{e:#}"), "progress event dropped");
                }
            }
        });
        (tx, handle)
    }

    async fn fail(
        &self,
        job: &mut CompositionJob,
        artifact: &mut VideoArtifact,
        err: RenderError,
    ) -> RenderError {
        let diagnostic = err.diagnostic();
        error!(task_id = %job.task_id, story_id = %job.story_id, kind = %err.kind(), error = %err, "composition failed");

        let produced = artifact.path.clone();
        artifact.mark_failed(&diagnostic);
        // Generated but not recorded: point at the file that does exist.
        if matches!(err, RenderError::Persistence { .. }) {
            artifact.path = produced;
        }
        if let Err(e) = self.collaborators.artifacts.save(artifact).await {
            warn!(video_id = %job.video_id, error = %format!("{e:#}"), "failed to save failure record");
        }

        if let Err(e) = job.fail(err.to_string()) {
            warn!(task_id = %job.task_id, error = %e, "job already terminal");
        }
        if let Err(e) = self
            .collaborators
            .sink
            .mark_failed(job.task_id, &err.to_string())
            .await
        {
            warn!(task_id = %job.task_id, error = %format!("{e:#}"), "failed to mark job failed");
        }
        self.notify(job, JobEvent::Failed).await;
        err
    }

    async fn discard(&self, staged: &Path) {
        if let Err(e) = self.collaborators.storage.discard(staged).await {
            warn!(path = %staged.display(), error = %format!("{e:#}"), "failed to discard staged output");
        }
    }

    async fn notify(&self, job: &CompositionJob, event: JobEvent) {
        let payload = event.payload(job);
        if let Err(e) = self
            .collaborators
            .sink
            .emit(&self.config.event_channel, event.name(), payload)
            .await
        {
            warn!(task_id = %job.task_id, event = event.name(), error = %format!("{e:#}"), "event dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
