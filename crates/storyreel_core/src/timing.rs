use serde::{Deserialize, Serialize};

use crate::types::TimeUs;

/// On-screen time for a page without a finished narration clip.
pub const FALLBACK_PAGE_DURATION: TimeUs = TimeUs(5_000_000);

/// Per-page on-screen durations, in page order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageDurations(pub Vec<TimeUs>);

impl PageDurations {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TimeUs> {
        self.0.get(index).copied()
    }

    /// Sum of all durations strictly before `index`. Indices past the end
    /// clamp to the total.
    pub fn cumulative_start(&self, index: usize) -> TimeUs {
        self.0.iter().take(index).sum()
    }

    pub fn total(&self) -> TimeUs {
        self.0.iter().sum()
    }

    /// Half-open `[start, end)` window for the page at `index`.
    pub fn window(&self, index: usize) -> (TimeUs, TimeUs) {
        let start = self.cumulative_start(index);
        let end = start + self.get(index).unwrap_or(TimeUs::ZERO);
        (start, end)
    }

    /// Durations as decimal-second strings, the form persisted with artifacts.
    pub fn to_seconds_strings(&self) -> Vec<String> {
        self.0.iter().map(|d| format_seconds(*d)).collect()
    }
}

/// Render a span in seconds with trailing zeros trimmed (`4`, `2.5`, `1.001`).
pub fn format_seconds(t: TimeUs) -> String {
    let formatted = format!("{:.6}", t.as_seconds());
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
