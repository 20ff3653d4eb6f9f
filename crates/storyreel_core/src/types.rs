use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::settings::StorySettings;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

/// A point or span on the story timeline, in microseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    /// Convert a known-good literal. Saturates at the `i64` range; use
    /// [`TimeUs::try_from_seconds`] for anything read from outside.
    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    /// Convert a measured or configured duration, rejecting NaN, infinities
    /// and values beyond the microsecond range.
    pub fn try_from_seconds(s: f64) -> Result<Self> {
        let us = (s * 1_000_000.0).round();
        if !us.is_finite() || us >= i64::MAX as f64 || us <= i64::MIN as f64 {
            return Err(CoreError::InvalidDuration(s));
        }
        Ok(Self(us as i64))
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0 / 1_000
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for TimeUs {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(TimeUs::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a TimeUs> for TimeUs {
    fn sum<I: Iterator<Item = &'a TimeUs>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{hours:02}:{mins:02}:{secs:02}.{ms:03}")
    }
}

// ---------------------------------------------------------------------------
// Media references
// ---------------------------------------------------------------------------

/// Generation state of a piece of page media, as recorded by the content pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRef {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeechRef {
    pub path: PathBuf,
    pub status: GenerationStatus,
}

impl SpeechRef {
    pub fn is_ready(&self) -> bool {
        self.status == GenerationStatus::Done
    }
}

// ---------------------------------------------------------------------------
// Page / Story
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_number: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub default_image: Option<ImageRef>,
    #[serde(default)]
    pub default_speech: Option<SpeechRef>,
}

impl Page {
    /// The narration clip, if one finished generating.
    pub fn ready_speech(&self) -> Option<&SpeechRef> {
        self.default_speech.as_ref().filter(|s| s.is_ready())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryWithPages {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub settings: StorySettings,
    pub pages: Vec<Page>,
}

impl StoryWithPages {
    /// Pages in ascending `page_number` order.
    pub fn ordered_pages(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.pages.iter().collect();
        pages.sort_by_key(|p| p.page_number);
        pages
    }

    /// Check the invariants a composition run relies on.
    pub fn validate(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(CoreError::NoPages(self.id));
        }
        self.settings.validate()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
