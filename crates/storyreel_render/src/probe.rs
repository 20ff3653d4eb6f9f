use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use storyreel_core::types::TimeUs;
use tokio::process::Command;

use crate::error::{RenderError, Result};

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// What a narration clip looks like to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioProbe {
    pub duration: TimeUs,
    pub codec: Option<String>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Ffprobe {
    binary: PathBuf,
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl Ffprobe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run ffprobe on an audio file and read its duration.
    pub async fn probe_audio(&self, path: &Path) -> Result<AudioProbe> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(RenderError::FileNotFound(path.to_path_buf()));
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RenderError::FfprobeExec(format!("{}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::ProbeFailed {
                path: path.to_path_buf(),
                reason: format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let probe: FfprobeOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| RenderError::ProbeFailed {
                path: path.to_path_buf(),
                reason: format!("unreadable ffprobe output: {e}"),
            })?;
        parse_probe_output(&probe).map_err(|reason| RenderError::ProbeFailed {
            path: path.to_path_buf(),
            reason,
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// The first audio stream's duration wins over the container's.
fn parse_probe_output(probe: &FfprobeOutput) -> std::result::Result<AudioProbe, String> {
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let duration = audio_stream
        .and_then(|s| parse_seconds(s.duration.as_deref()))
        .or_else(|| parse_seconds(probe.format.duration.as_deref()))
        .ok_or_else(|| "no duration reported".to_string())?;
    let duration = TimeUs::try_from_seconds(duration).map_err(|e| e.to_string())?;

    Ok(AudioProbe {
        duration,
        codec: audio_stream.and_then(|s| s.codec_name.clone()),
        channels: audio_stream.and_then(|s| s.channels),
        sample_rate: audio_stream
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse().ok()),
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
