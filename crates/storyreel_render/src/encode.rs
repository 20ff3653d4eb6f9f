use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use storyreel_core::settings::StorySettings;
use storyreel_core::types::TimeUs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::EncodeCommand;
use crate::error::{RenderError, Result};
use crate::graph::num;

/// Called with a whole percentage whenever it changes.
pub type ProgressCallback = Box<dyn FnMut(u8) + Send>;

const STDERR_TAIL_LINES: usize = 40;

const ALPHA_PIXEL_FORMATS: &[&str] = &["yuva", "rgba", "bgra", "argb", "abgr", "gbrap", "ya8", "ya16"];

// ---------------------------------------------------------------------------
// Output options
// ---------------------------------------------------------------------------

/// Container for a video codec.
pub fn container_extension(codec: &str) -> &'static str {
    let codec = codec.to_ascii_lowercase();
    if codec.starts_with("libvpx") || codec == "vp8" || codec == "vp9" {
        "webm"
    } else if codec.contains("prores") || codec == "qtrle" || codec == "png" {
        "mov"
    } else {
        "mp4"
    }
}

fn has_alpha(pixel_format: &str) -> bool {
    let pf = pixel_format.to_ascii_lowercase();
    ALPHA_PIXEL_FORMATS.iter().any(|p| pf.starts_with(p))
}

/// Map the graph outputs and attach codec options.
pub fn configure_output(
    command: &mut EncodeCommand,
    settings: &StorySettings,
    video_label: &str,
    audio_label: &str,
) {
    let video = &settings.video;
    let audio = &settings.audio;
    let container = container_extension(video.codec());

    command
        .output_arg("-map")
        .output_arg(format!("[{video_label}]"))
        .output_arg("-map")
        .output_arg(format!("[{audio_label}]"))
        .output_arg("-c:v")
        .output_arg(video.codec())
        .output_arg("-pix_fmt")
        .output_arg(video.pixel_format())
        .output_arg("-r")
        .output_arg(num(video.fps));

    match video.bitrate.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        Some(bitrate) => {
            command.output_arg("-b:v").output_arg(bitrate);
        }
        None if video.uses_default_codec() => {
            command
                .output_arg("-crf")
                .output_arg(video.crf.unwrap_or(storyreel_core::settings::DEFAULT_CRF).to_string())
                .output_arg("-preset")
                .output_arg(video.preset.as_deref().unwrap_or(storyreel_core::settings::DEFAULT_PRESET));
        }
        None => {}
    }

    // aac does not go into webm.
    let audio_codec = match (&audio.codec, container) {
        (None, "webm") => "libopus",
        _ => audio.codec(),
    };
    command
        .output_arg("-c:a")
        .output_arg(audio_codec)
        .output_arg("-b:a")
        .output_arg(audio.bitrate())
        .output_arg("-ac")
        .output_arg(audio.channels.to_string())
        .output_arg("-ar")
        .output_arg(audio.sample_rate.to_string());

    if container == "mp4" && !has_alpha(video.pixel_format()) {
        command.output_arg("-movflags").output_arg("+faststart");
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Finished,
}

/// Turns `-progress` key/value blocks into percentages.
struct ProgressTracker {
    total_secs: f64,
    fps: f64,
    timemark: Option<f64>,
    frames: Option<u64>,
    last_percent: Option<u8>,
    on_progress: Option<ProgressCallback>,
    phase: Phase,
}

impl ProgressTracker {
    fn new(total: TimeUs, fps: f64, on_progress: Option<ProgressCallback>) -> Self {
        Self {
            total_secs: total.as_seconds(),
            fps,
            timemark: None,
            frames: None,
            last_percent: None,
            on_progress,
            phase: Phase::Running,
        }
    }

    fn observe(&mut self, line: &str) {
        if self.phase != Phase::Running {
            return;
        }
        let Some((key, value)) = line.trim().split_once('=') else {
            return;
        };
        match key {
            "out_time" => {
                if let Some(t) = parse_time_str(value) {
                    self.timemark = Some(t);
                }
            }
            "out_time_us" | "out_time_ms" if self.timemark.is_none() => {
                if let Ok(us) = value.parse::<i64>() {
                    self.timemark = Some(TimeUs(us).as_seconds().max(0.0));
                }
            }
            "frame" => self.frames = value.parse().ok(),
            "progress" => self.report(),
            _ => {}
        }
    }

    fn percent(&self) -> Option<u8> {
        if self.total_secs <= 0.0 {
            return None;
        }
        let ratio = match (self.timemark, self.frames) {
            (Some(t), _) => t / self.total_secs,
            (None, Some(f)) if self.fps > 0.0 => f as f64 / (self.total_secs * self.fps),
            _ => return None,
        };
        Some((ratio * 100.0).round().clamp(0.0, 100.0) as u8)
    }

    fn report(&mut self) {
        if let Some(p) = self.percent() {
            self.emit(p);
        }
    }

    fn emit(&mut self, percent: u8) {
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        if let Some(cb) = self.on_progress.as_mut() {
            cb(percent);
        }
    }

    /// Success: guarantee a final 100 and return the measured duration.
    fn finish(&mut self) -> f64 {
        if self.phase == Phase::Running && self.last_percent.map_or(true, |p| p < 100) {
            self.emit(100);
        }
        self.phase = Phase::Finished;
        self.timemark.unwrap_or(self.total_secs)
    }

    fn fail(&mut self) {
        self.phase = Phase::Finished;
    }
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    let total = hours * 3600.0 + mins * 60.0 + secs;
    (total >= 0.0).then_some(total)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Encoder {
    ffmpeg: PathBuf,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Encoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Run ffmpeg to completion and return the output duration in seconds.
    ///
    /// `fps` feeds the frame-count fallback when no timemark is reported.
    /// When `cancel` flips to `true` the process is killed.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        command: &EncodeCommand,
        output: &Path,
        total: TimeUs,
        fps: f64,
        context_id: &str,
        on_progress: Option<ProgressCallback>,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<f64> {
        let args = command.args(output);
        debug!(context_id, ffmpeg = %self.ffmpeg.display(), ?args, "spawning encoder");

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::FfmpegNotFound(self.ffmpeg.clone())
                } else {
                    RenderError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::Io(std::io::Error::other("encoder stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::Io(std::io::Error::other("encoder stderr not captured")))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        });

        let mut tracker = ProgressTracker::new(total, fps, on_progress);
        info!(context_id, total = %total, "encoder started");

        let outcome = tokio::select! {
            res = supervise(&mut child, stdout, &mut tracker) => Some(res),
            _ = cancelled(&mut cancel) => None,
        };

        let status = match outcome {
            Some(res) => res?,
            None => {
                tracker.fail();
                if let Err(e) = child.kill().await {
                    warn!(context_id, error = %e, "failed to kill encoder");
                }
                stderr_task.abort();
                info!(context_id, "encoder cancelled");
                return Err(RenderError::Cancelled);
            }
        };

        let tail: Vec<String> = stderr_task.await.map(Vec::from).unwrap_or_default();

        if !status.success() {
            tracker.fail();
            let last = tail.iter().rev().find(|l| !l.trim().is_empty());
            let message = match last {
                Some(line) => format!("ffmpeg exited with {status}: {}", line.trim()),
                None => format!("ffmpeg exited with {status}"),
            };
            warn!(context_id, %status, "encoder failed");
            return Err(RenderError::EncodeFailed {
                message,
                stderr_tail: tail.join("\n"),
            });
        }

        let duration = tracker.finish();
        info!(context_id, duration, "encoder finished");
        Ok(duration)
    }
}

async fn supervise(
    child: &mut Child,
    stdout: ChildStdout,
    tracker: &mut ProgressTracker,
) -> Result<ExitStatus> {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        tracker.observe(&line);
    }
    Ok(child.wait().await?)
}

/// Resolves once `cancel` holds `true`. Never resolves without a live sender.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel {
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
    std::future::pending::<()>().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
