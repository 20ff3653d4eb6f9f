//! Text measurement, greedy word wrapping, and escaping for ffmpeg filter syntax.
//!
//! Widths come from the actual font outlines in a [`FontBook`], so wrap points
//! follow the face drawtext is given.

use crate::fonts::FontBook;
use crate::layout::TextElement;

/// Horizontal space inside a text box that wrapping never uses.
pub const HORIZONTAL_PADDING: f64 = 120.0;

/// Line height is 1.2x the font size, kept as a ratio so integer sizes stay exact.
const LINE_HEIGHT_NUM: f64 = 12.0;
const LINE_HEIGHT_DEN: f64 = 10.0;

/// Rendered width of a single line of `text` in pixels.
pub fn measure_width(fonts: &FontBook, text: &str, font_size: f64, font_family: Option<&str>) -> f64 {
    fonts.face(font_family).measure(text, font_size)
}

/// Greedy word wrap against `element.width - HORIZONTAL_PADDING`.
///
/// Existing line breaks are kept. A word wider than a full line is split
/// character by character. Text is returned unchanged when the width is
/// missing or non-positive; a box narrower than the padding still gets one
/// glyph per line.
pub fn wrap(fonts: &FontBook, text: &str, element: &TextElement) -> String {
    if text.is_empty() || !(element.width > 0.0) {
        return text.to_string();
    }
    let max_width = (element.width - HORIZONTAL_PADDING).max(0.0);

    let face = fonts.face(element.font_family.as_deref());
    let fits = |s: &str| face.measure(s, element.font_size) <= max_width;

    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = Vec::new();

    for paragraph in normalized.split('\n') {
        let mut current = String::new();
        let mut any_word = false;

        for word in paragraph.split_whitespace() {
            any_word = true;
            if current.is_empty() {
                if fits(word) {
                    current.push_str(word);
                    continue;
                }
            } else {
                let candidate = format!("{current} {word}");
                if fits(&candidate) {
                    current = candidate;
                    continue;
                }
                lines.push(std::mem::take(&mut current));
                if fits(word) {
                    current.push_str(word);
                    continue;
                }
            }

            // Word alone is wider than the line.
            for ch in word.chars() {
                let mut candidate = current.clone();
                candidate.push(ch);
                if !current.is_empty() && !fits(&candidate) {
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                } else {
                    current = candidate;
                }
            }
        }

        if !current.is_empty() || !any_word {
            lines.push(current);
        }
    }

    lines.join("\n")
}

/// Pixel height of a block of `line_count` lines.
pub fn block_height(line_count: usize, font_size: f64, line_spacing: Option<f64>) -> f64 {
    if line_count == 0 {
        return 0.0;
    }
    let n = line_count as f64;
    let spacing = line_spacing.unwrap_or(0.0);
    (n * font_size * LINE_HEIGHT_NUM / LINE_HEIGHT_DEN + (n - 1.0) * spacing).ceil()
}

/// Escape a value for one level of ffmpeg option parsing.
///
/// Backslash goes first so later escapes are not doubled. Newlines of any
/// flavour become a backslash-escaped line feed, which option parsing turns
/// back into a real line break.
pub fn escape_for_filter_syntax(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('%', "\\%")
        .replace(':', "\\:")
        .replace(',', "\\,")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('=', "\\=")
        .replace(';', "\\;")
        .replace('#', "\\#")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\\\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
