//! Typed story settings.
//!
//! Settings arrive from the story store as JSON. They are deserialized into these
//! structures and checked once with [`StorySettings::validate`] before a
//! composition run starts; downstream stages read typed values only.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::types::Resolution;

pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
pub const DEFAULT_CRF: u8 = 23;
pub const DEFAULT_PRESET: &str = "medium";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorySettings {
    #[serde(default)]
    pub layout_id: Option<Uuid>,
    #[serde(default)]
    pub video: VideoSettings,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub background: Background,
}

impl StorySettings {
    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        self.audio.validate()?;
        self.background.validate()
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: Option<String>,
    pub pixel_format: Option<String>,
    /// Explicit target bitrate such as `"4M"`. Takes precedence over `crf`.
    pub bitrate: Option<String>,
    pub crf: Option<u8>,
    pub preset: Option<String>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30.0,
            codec: None,
            pixel_format: None,
            bitrate: None,
            crf: None,
            preset: None,
        }
    }
}

impl VideoSettings {
    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    pub fn codec(&self) -> &str {
        non_empty(self.codec.as_deref()).unwrap_or(DEFAULT_VIDEO_CODEC)
    }

    pub fn pixel_format(&self) -> &str {
        non_empty(self.pixel_format.as_deref()).unwrap_or(DEFAULT_PIXEL_FORMAT)
    }

    pub fn uses_default_codec(&self) -> bool {
        self.codec() == DEFAULT_VIDEO_CODEC
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::InvalidSettings(format!(
                "resolution must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(CoreError::InvalidSettings(format!(
                "resolution must be even for 4:2:0 output, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(CoreError::InvalidSettings(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if let Some(crf) = self.crf {
            if crf > 51 {
                return Err(CoreError::InvalidSettings(format!(
                    "crf must be within 0..=51, got {crf}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    pub codec: Option<String>,
    pub bitrate: Option<String>,
    pub channels: u8,
    pub sample_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            codec: None,
            bitrate: None,
            channels: 2,
            sample_rate: 48_000,
        }
    }
}

impl AudioSettings {
    pub fn codec(&self) -> &str {
        non_empty(self.codec.as_deref()).unwrap_or(DEFAULT_AUDIO_CODEC)
    }

    pub fn bitrate(&self) -> &str {
        non_empty(self.bitrate.as_deref()).unwrap_or(DEFAULT_AUDIO_BITRATE)
    }

    /// ffmpeg channel layout name for the configured channel count.
    pub fn channel_layout(&self) -> &'static str {
        match self.channels {
            1 => "mono",
            3 => "2.1",
            4 => "quad",
            5 => "5.0",
            6 => "5.1",
            7 => "6.1",
            8 => "7.1",
            _ => "stereo",
        }
    }

    fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.channels) {
            return Err(CoreError::InvalidSettings(format!(
                "audio channels must be within 1..=8, got {}",
                self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(CoreError::InvalidSettings(
                "audio sample rate must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Background
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundFit {
    #[default]
    Cover,
    Contain,
    Fill,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase", try_from = "RawBackground")]
pub enum Background {
    Color {
        color: String,
    },
    Image {
        path: PathBuf,
        fit: BackgroundFit,
        opacity: f64,
        /// Fill shown behind a letterboxed or translucent image.
        color: String,
    },
    Gradient {
        colors: Vec<String>,
        angle: f64,
    },
}

/// Wire shape of a background. A missing or unknown `type` means a colour fill.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBackground {
    #[serde(rename = "type")]
    kind: Option<String>,
    color: Option<String>,
    path: Option<PathBuf>,
    fit: BackgroundFit,
    opacity: Option<f64>,
    colors: Vec<String>,
    angle: f64,
}

impl TryFrom<RawBackground> for Background {
    type Error = String;

    fn try_from(raw: RawBackground) -> std::result::Result<Self, Self::Error> {
        let color = raw.color.unwrap_or_default();
        match raw.kind.as_deref() {
            Some("image") => {
                let path = raw
                    .path
                    .ok_or_else(|| "image background requires a path".to_string())?;
                Ok(Background::Image {
                    path,
                    fit: raw.fit,
                    opacity: raw.opacity.unwrap_or(1.0),
                    color,
                })
            }
            Some("gradient") => Ok(Background::Gradient {
                colors: raw.colors,
                angle: raw.angle,
            }),
            _ => Ok(Background::Color { color }),
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Background::Color {
            color: String::new(),
        }
    }
}

impl Background {
    fn validate(&self) -> Result<()> {
        if let Background::Image { opacity, path, .. } = self {
            if !(0.0..=1.0).contains(opacity) {
                return Err(CoreError::InvalidSettings(format!(
                    "background opacity must be within [0, 1], got {opacity}"
                )));
            }
            if path.as_os_str().is_empty() {
                return Err(CoreError::InvalidSettings(
                    "background image path is empty".into(),
                ));
            }
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
