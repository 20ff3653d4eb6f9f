//! Builds the `-filter_complex` graph for a story: background canvas, per-page
//! image overlays and captions gated to the page's time window, and the
//! narration mix.

use storyreel_core::fonts::FontBook;
use storyreel_core::layout::{first_image, first_text, ImageElement, LayoutElement, TextElement};
use storyreel_core::settings::{Background, BackgroundFit, StorySettings};
use storyreel_core::text::{block_height, wrap};
use storyreel_core::timing::{format_seconds, PageDurations};
use storyreel_core::types::{Page, TimeUs};
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::graph::{num, px, Filter, FilterChain, FilterGraph, Pad};
use crate::inputs::MediaInputMap;

pub const CANVAS: &str = "canvas";
pub const AUDIO_OUT: &str = "aout";

#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraphResult {
    pub graph: FilterGraph,
    pub video_label: String,
    pub audio_label: String,
}

impl FilterGraphResult {
    pub fn filter_string(&self) -> String {
        self.graph.to_string()
    }
}

/// Compose the whole graph. `pages`, `durations` and `inputs` are indexed by
/// page position and must agree on order. Captions are wrapped against the
/// face `fonts` resolves for the text element.
pub fn build(
    pages: &[&Page],
    layout: &[LayoutElement],
    settings: &StorySettings,
    durations: &PageDurations,
    total: TimeUs,
    inputs: &MediaInputMap,
    fonts: &FontBook,
) -> Result<FilterGraphResult> {
    let mut graph = FilterGraph::default();

    push_background(&mut graph, settings, total)?;

    let image_el = first_image(layout);
    let text_el = first_text(layout);
    let mut current = Pad::named(CANVAS);

    for (i, page) in pages.iter().enumerate() {
        let (start, end) = durations.window(i);
        let (start, end) = (start.as_seconds(), end.as_seconds());

        if let (Some(el), Some(input)) = (image_el, inputs.image(i)) {
            current = push_image_overlay(&mut graph, current, el, input, i, start, end);
        }
        if let Some(el) = text_el {
            let caption = Caption {
                el,
                content: &page.content,
                page_index: i,
                start,
                end,
            };
            if let Some(next) = push_caption(&mut graph, current.clone(), fonts, caption) {
                current = next;
            }
        }
    }

    let audio = push_audio(&mut graph, pages.len(), settings, durations, total, inputs);

    debug!(chains = graph.len(), video = current.name(), "built filter graph");
    Ok(FilterGraphResult {
        graph,
        video_label: current.name().to_string(),
        audio_label: audio.name().to_string(),
    })
}

// ---------------------------------------------------------------------------
// Background
// ---------------------------------------------------------------------------

fn color_source(color: &str, settings: &StorySettings, total: TimeUs) -> Filter {
    let res = settings.video.resolution();
    Filter::new("color")
        .text("c", normalize_color(color).unwrap_or_else(|| "black".to_string()))
        .opt("s", res)
        .opt("d", format_seconds(total))
        .opt("r", num(settings.video.fps))
}

fn push_background(graph: &mut FilterGraph, settings: &StorySettings, total: TimeUs) -> Result<()> {
    match &settings.background {
        Background::Color { color } => {
            graph.push(FilterChain::source(
                vec![color_source(color, settings, total)],
                Pad::named(CANVAS),
            ));
        }
        Background::Image {
            path,
            fit,
            opacity,
            color,
        } => {
            let res = settings.video.resolution();
            graph.push(FilterChain::source(
                vec![color_source(color, settings, total)],
                Pad::named("bg_base"),
            ));

            let mut filters = vec![
                Filter::new("movie").text("filename", path.to_string_lossy()),
                Filter::new("loop").opt("loop", -1).opt("size", 1),
                Filter::new("setpts").arg(format!("N/({}*TB)", num(settings.video.fps))),
            ];
            match fit {
                BackgroundFit::Cover => {
                    filters.push(
                        Filter::new("scale")
                            .arg(res.width)
                            .arg(res.height)
                            .opt("force_original_aspect_ratio", "increase"),
                    );
                    filters.push(Filter::new("crop").arg(res.width).arg(res.height));
                }
                BackgroundFit::Contain => filters.push(
                    Filter::new("scale")
                        .arg(res.width)
                        .arg(res.height)
                        .opt("force_original_aspect_ratio", "decrease"),
                ),
                BackgroundFit::Fill => {
                    filters.push(Filter::new("scale").arg(res.width).arg(res.height))
                }
            }
            if *opacity < 1.0 {
                filters.push(Filter::new("format").arg("rgba"));
                filters.push(Filter::new("colorchannelmixer").opt("aa", num(*opacity)));
            }
            graph.push(FilterChain::source(filters, Pad::named("bg_img")));

            let overlay = match fit {
                BackgroundFit::Contain => Filter::new("overlay")
                    .expr("x", "(W-w)/2")
                    .expr("y", "(H-h)/2"),
                _ => Filter::new("overlay").opt("x", 0).opt("y", 0),
            }
            .opt("shortest", 1);
            graph.push(FilterChain::new(
                vec![Pad::named("bg_base"), Pad::named("bg_img")],
                vec![overlay],
                Pad::named(CANVAS),
            ));
        }
        Background::Gradient { .. } => {
            return Err(RenderError::Unsupported(
                "gradient backgrounds are not supported".into(),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

fn push_image_overlay(
    graph: &mut FilterGraph,
    current: Pad,
    el: &ImageElement,
    input: usize,
    page_index: usize,
    start: f64,
    end: f64,
) -> Pad {
    let scaled = Pad::named(format!("img{page_index}"));
    graph.push(FilterChain::new(
        vec![Pad::video_input(input)],
        vec![Filter::new("scale")
            .arg(px(el.width).max(1))
            .arg(px(el.height).max(1))],
        scaled.clone(),
    ));

    let out = Pad::named(format!("v{page_index}"));
    graph.push(FilterChain::new(
        vec![current, scaled],
        vec![Filter::new("overlay")
            .opt("x", px(el.position.x))
            .opt("y", px(el.position.y))
            .enable_between(start, end)],
        out.clone(),
    ));
    out
}

struct Caption<'a> {
    el: &'a TextElement,
    content: &'a str,
    page_index: usize,
    start: f64,
    end: f64,
}

/// Draw the caption centred in the text box. Returns `None` for blank content.
///
/// Wrapped lines are passed as real line breaks with text expansion off, so
/// `%` and `\\` in page content are drawn as typed.
fn push_caption(
    graph: &mut FilterGraph,
    current: Pad,
    fonts: &FontBook,
    caption: Caption<'_>,
) -> Option<Pad> {
    let Caption {
        el,
        content,
        page_index,
        start,
        end,
    } = caption;
    if content.trim().is_empty() {
        return None;
    }

    let wrapped = wrap(fonts, content, el);
    let lines = wrapped.split('\n').count();
    let block = block_height(lines, el.font_size, el.line_spacing);
    let y = if block <= el.height {
        el.position.y + (el.height - block) / 2.0
    } else {
        el.position.y
    };

    // Draw with the face the lines were measured against.
    let family = el.font_family.as_deref().filter(|f| !f.trim().is_empty());
    let face = fonts.face(family);
    if let Some(family) = family.filter(|f| !fonts.knows(f)) {
        debug!(family, using = face.name(), "unknown caption font");
    }
    let mut drawtext = Filter::new("drawtext");
    drawtext = match face.file() {
        Some(file) => drawtext.text("fontfile", file.to_string_lossy()),
        None => drawtext.text("font", face.name()),
    };
    drawtext = drawtext
        .text("text", wrapped)
        .opt("expansion", "none")
        .opt("fontsize", px(el.font_size).max(1))
        .text(
            "fontcolor",
            normalize_color(&el.color).unwrap_or_else(|| "white".to_string()),
        )
        .expr("x", format!("{}+({}-tw)/2", px(el.position.x), px(el.width)))
        .opt("y", px(y));
    if let Some(spacing) = el.line_spacing {
        drawtext = drawtext.opt("line_spacing", px(spacing));
    }
    if let Some(box_color) = el.background_color.as_deref().and_then(normalize_color) {
        drawtext = drawtext
            .opt("box", 1)
            .text("boxcolor", box_color)
            .opt("boxborderw", px(el.box_border_width.unwrap_or(0.0)));
    }
    drawtext = drawtext.enable_between(start, end);

    let out = Pad::named(format!("t{page_index}"));
    graph.push(FilterChain::new(vec![current], vec![drawtext], out.clone()));
    Some(out)
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

fn push_audio(
    graph: &mut FilterGraph,
    page_count: usize,
    settings: &StorySettings,
    durations: &PageDurations,
    total: TimeUs,
    inputs: &MediaInputMap,
) -> Pad {
    let out = Pad::named(AUDIO_OUT);
    let mut delayed = Vec::new();

    for i in 0..page_count {
        let Some(input) = inputs.speech(i) else {
            continue;
        };
        let ms = durations.cumulative_start(i).as_millis();
        let label = Pad::named(format!("a{i}"));
        graph.push(FilterChain::new(
            vec![Pad::audio_input(input)],
            vec![Filter::new("adelay").opt("delays", ms).opt("all", 1)],
            label.clone(),
        ));
        delayed.push(label);
    }

    if delayed.is_empty() {
        graph.push(FilterChain::source(
            vec![
                Filter::new("anullsrc")
                    .opt("r", settings.audio.sample_rate)
                    .opt("cl", settings.audio.channel_layout()),
                Filter::new("atrim").opt("duration", format_seconds(total)),
            ],
            out.clone(),
        ));
    } else {
        let n = delayed.len();
        graph.push(FilterChain::new(
            delayed,
            vec![
                Filter::new("amix")
                    .opt("inputs", n)
                    .opt("duration", "longest")
                    .opt("dropout_transition", 0),
                Filter::new("apad"),
            ],
            out.clone(),
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// Colours
// ---------------------------------------------------------------------------

/// Convert `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(...)` and `rgba(...)` to
/// `0xRRGGBBAA`. Other non-empty values pass through. Blank is `None`.
pub fn normalize_color(color: &str) -> Option<String> {
    let c = color.trim();
    if c.is_empty() {
        return None;
    }
    if let Some(hex) = c.strip_prefix('#') {
        if let Some(rgba) = parse_hex(hex) {
            return Some(hex_rgba(rgba));
        }
    }
    let lower = c.to_ascii_lowercase();
    if let Some(body) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|b| b.strip_suffix(')'))
    {
        if let Some(rgba) = parse_functional(body) {
            return Some(hex_rgba(rgba));
        }
    }
    Some(c.to_string())
}

fn hex_rgba([r, g, b, a]: [u8; 4]) -> String {
    format!("0x{r:02X}{g:02X}{b:02X}{a:02X}")
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, ch) in hex.chars().enumerate() {
                let v = ch.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 | 8 => {
            let mut out = [255u8; 4];
            for i in 0..hex.len() / 2 {
                out[i] = byte(&hex[i * 2..i * 2 + 2])?;
            }
            Some(out)
        }
        _ => None,
    }
}

fn parse_functional(body: &str) -> Option<[u8; 4]> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let mut out = [255u8; 4];
    for (i, part) in parts.iter().take(3).enumerate() {
        let v: f64 = part.parse().ok()?;
        out[i] = v.clamp(0.0, 255.0).round() as u8;
    }
    if let Some(alpha) = parts.get(3) {
        let a: f64 = alpha.parse().ok()?;
        out[3] = (a.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::EncodeCommand;
    use crate::inputs::register_all;
    use crate::test_support::{page, FakeStorage};
    use std::path::PathBuf;
    use storyreel_core::layout::{default_layout, scale_layout, Position};
    use storyreel_core::timing::FALLBACK_PAGE_DURATION;

    fn durations(secs: &[f64]) -> PageDurations {
        PageDurations(secs.iter().map(|s| TimeUs::from_seconds(*s)).collect())
    }

    fn fonts() -> FontBook {
        FontBook::builtin().unwrap()
    }

    fn build_for(pages: &[Page], settings: &StorySettings, secs: &[f64]) -> Result<FilterGraphResult> {
        let refs: Vec<&Page> = pages.iter().collect();
        let storage = FakeStorage::rooted("/media");
        let mut cmd = EncodeCommand::new();
        let inputs = register_all(&mut cmd, &refs, &storage);
        let d = durations(secs);
        let layout = scale_layout(&default_layout(), settings.video.resolution());
        build(&refs, &layout, settings, &d, d.total(), &inputs, &fonts())
    }

    #[test]
    fn empty_color_background_is_black_for_full_duration() {
        let pages = [page(1, "Hi", None, None), page(2, "Bye", None, None)];
        let result = build_for(&pages, &StorySettings::default(), &[4.0, 5.0]).unwrap();
        let s = result.filter_string();
        assert!(
            s.starts_with("color=c=black:s=1920x1080:d=9:r=30[canvas]"),
            "{s}"
        );
    }

    #[test]
    fn hex_background_is_normalized() {
        let settings = StorySettings {
            background: Background::Color {
                color: "#336699".into(),
            },
            ..Default::default()
        };
        let result = build_for(&[page(1, "Hi", None, None)], &settings, &[5.0]).unwrap();
        assert!(result.filter_string().starts_with("color=c=0x336699FF:"));
    }

    #[test]
    fn gradient_background_fails_fast() {
        let settings = StorySettings {
            background: Background::Gradient {
                colors: vec!["#000".into(), "#fff".into()],
                angle: 90.0,
            },
            ..Default::default()
        };
        let err = build_for(&[page(1, "Hi", None, None)], &settings, &[5.0]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn image_background_cover_with_opacity() {
        let settings = StorySettings {
            background: Background::Image {
                path: PathBuf::from("/bg/forest: night.png"),
                fit: BackgroundFit::Cover,
                opacity: 0.5,
                color: String::new(),
            },
            ..Default::default()
        };
        let s = build_for(&[page(1, "Hi", None, None)], &settings, &[5.0])
            .unwrap()
            .filter_string();
        assert!(s.contains("movie=filename=/bg/forest\\\\: night.png,loop=loop=-1:size=1"), "{s}");
        assert!(s.contains("scale=1920:1080:force_original_aspect_ratio=increase,crop=1920:1080"));
        assert!(s.contains("format=rgba,colorchannelmixer=aa=0.5[bg_img]"));
        assert!(s.contains("[bg_base][bg_img]overlay=x=0:y=0:shortest=1[canvas]"));
    }

    #[test]
    fn contain_background_is_centred() {
        let settings = StorySettings {
            background: Background::Image {
                path: PathBuf::from("/bg.png"),
                fit: BackgroundFit::Contain,
                opacity: 1.0,
                color: "#fff".into(),
            },
            ..Default::default()
        };
        let s = build_for(&[page(1, "Hi", None, None)], &settings, &[5.0])
            .unwrap()
            .filter_string();
        assert!(s.starts_with("color=c=0xFFFFFFFF:"));
        assert!(s.contains("force_original_aspect_ratio=decrease[bg_img]"));
        assert!(s.contains("overlay=x='(W-w)/2':y='(H-h)/2':shortest=1[canvas]"));
        assert!(!s.contains("colorchannelmixer"));
    }

    #[test]
    fn pages_chain_overlays_and_captions_in_order() {
        let pages = [
            page(1, "Hi", Some("p1.png"), Some("p1.mp3")),
            page(2, "Bye", None, None),
        ];
        let result = build_for(&pages, &StorySettings::default(), &[4.0, 5.0]).unwrap();
        let s = result.filter_string();

        // Default layout image box at 1920x1080: 864x864 at (72,108).
        assert!(s.contains("[0:v]scale=864:864[img0]"), "{s}");
        assert!(s.contains("[canvas][img0]overlay=x=72:y=108:enable='gte(t,0)*lt(t,4)'[v0]"));
        assert!(s.contains("[v0]drawtext=font=DejaVu Sans:text=Hi:expansion=none:"), "{s}");
        assert!(s.contains("enable='gte(t,0)*lt(t,4)'[t0]"));
        assert!(s.contains("[t0]drawtext=font=DejaVu Sans:text=Bye:"));
        assert!(s.contains("enable='gte(t,4)*lt(t,9)'[t1]"));
        assert_eq!(result.video_label, "t1");
    }

    #[test]
    fn caption_is_centred_with_box() {
        let pages = [page(1, "Hi", None, None)];
        let s = build_for(&pages, &StorySettings::default(), &[5.0])
            .unwrap()
            .filter_string();
        // Text box 864x864 at (984,108), font 48, one line: block 58 -> y = 108 + 403.
        assert!(s.contains("fontsize=48:fontcolor=0xFFFFFFFF:x='984+(864-tw)/2':y=511"), "{s}");
        assert!(s.contains("line_spacing=14:box=1:boxcolor=0x00000080:boxborderw=24"));
    }

    #[test]
    fn tall_text_is_top_aligned() {
        let layout = vec![LayoutElement::Text(TextElement {
            color: "white".into(),
            background_color: None,
            font_size: 40.0,
            font_family: Some("DejaVu Sans".into()),
            position: Position { x: 10.0, y: 20.0 },
            width: 400.0,
            height: 30.0,
            box_border_width: None,
            line_spacing: None,
        })];
        let pages = [page(1, "Hello", None, None)];
        let refs: Vec<&Page> = pages.iter().collect();
        let d = durations(&[5.0]);
        let result = build(&refs, &layout, &StorySettings::default(), &d, d.total(), &MediaInputMap::default(), &fonts()).unwrap();
        let s = result.filter_string();
        assert!(s.contains("drawtext=font=DejaVu Sans:text=Hello:expansion=none:fontsize=40:fontcolor=white:x='10+(400-tw)/2':y=20:"), "{s}");
        assert!(!s.contains("box=1"));
    }

    #[test]
    fn blank_page_passes_stream_through() {
        let pages = [page(1, "  ", None, None)];
        let result = build_for(&pages, &StorySettings::default(), &[5.0]).unwrap();
        assert_eq!(result.video_label, CANVAS);
        assert_eq!(result.graph.chains_with("drawtext").count(), 0);
    }

    #[test]
    fn first_image_element_wins() {
        let layout = vec![
            LayoutElement::Image(ImageElement {
                width: 100.0,
                height: 50.0,
                position: Position { x: 1.0, y: 2.0 },
            }),
            LayoutElement::Image(ImageElement {
                width: 300.0,
                height: 300.0,
                position: Position { x: 0.0, y: 0.0 },
            }),
        ];
        let pages = [page(1, "", Some("p1.png"), None)];
        let refs: Vec<&Page> = pages.iter().collect();
        let mut cmd = EncodeCommand::new();
        let inputs = register_all(&mut cmd, &refs, &FakeStorage::new());
        let d = durations(&[5.0]);
        let s = build(&refs, &layout, &StorySettings::default(), &d, d.total(), &inputs, &fonts())
            .unwrap()
            .filter_string();
        assert!(s.contains("[0:v]scale=100:50[img0]"));
        assert_eq!(s.matches("overlay").count(), 1);
    }

    #[test]
    fn speech_is_delayed_and_mixed() {
        let pages = [
            page(1, "a", None, Some("p1.mp3")),
            page(2, "b", None, None),
            page(3, "c", None, Some("p3.mp3")),
        ];
        let result = build_for(&pages, &StorySettings::default(), &[4.0, 5.0, 2.5]).unwrap();
        let s = result.filter_string();
        assert!(s.contains("[0:a]adelay=delays=0:all=1[a0]"), "{s}");
        assert!(s.contains("[1:a]adelay=delays=9000:all=1[a2]"));
        assert!(s.contains("[a0][a2]amix=inputs=2:duration=longest:dropout_transition=0,apad[aout]"));
        assert_eq!(result.audio_label, AUDIO_OUT);
    }

    #[test]
    fn silence_when_no_speech() {
        let pages = [page(1, "a", None, None), page(2, "b", None, None)];
        let mut settings = StorySettings::default();
        settings.audio.channels = 1;
        settings.audio.sample_rate = 44_100;
        let s = build_for(&pages, &settings, &[5.0, 5.0]).unwrap().filter_string();
        assert!(s.ends_with("anullsrc=r=44100:cl=mono,atrim=duration=10[aout]"), "{s}");
        assert_eq!(FALLBACK_PAGE_DURATION, TimeUs::from_seconds(5.0));
    }

    #[test]
    fn page_text_cannot_break_the_graph() {
        let pages = [page(1, "a;b[c]=d, e's", None, None)];
        let s = build_for(&pages, &StorySettings::default(), &[5.0]).unwrap().filter_string();
        // Option level: \; \[ \] \= \, \'   Graph level: each backslash and
        // graph-special character escaped once more.
        assert!(
            s.contains(r"text=a\\\;b\\\[c\\\]\\=d\\\, e\\\'s:expansion=none:"),
            "{s}"
        );
    }

    #[test]
    fn wrapped_caption_keeps_real_line_breaks() {
        let layout = vec![LayoutElement::Text(TextElement {
            color: "white".into(),
            background_color: None,
            font_size: 40.0,
            font_family: None,
            position: Position { x: 0.0, y: 0.0 },
            width: 300.0,
            height: 400.0,
            box_border_width: None,
            line_spacing: None,
        })];
        let pages = [page(1, "Hello wonderful World", None, None)];
        let refs: Vec<&Page> = pages.iter().collect();
        let d = durations(&[5.0]);
        let fonts = fonts();
        let s = build(&refs, &layout, &StorySettings::default(), &d, d.total(), &MediaInputMap::default(), &fonts)
            .unwrap()
            .filter_string();

        let expected = storyreel_core::text::wrap(&fonts, "Hello wonderful World", match &layout[0] {
            LayoutElement::Text(t) => t,
            LayoutElement::Image(_) => unreachable!(),
        });
        assert!(expected.contains('\n'));
        // Each line break travels as backslash-backslash-newline so both
        // parsing levels hand drawtext a real line feed.
        let serialized = expected.replace('\n', "\\\\\n");
        assert!(s.contains(&format!("text={serialized}:expansion=none:")), "{s}");
        assert!(!s.contains("\\n"), "no literal backslash-n in {s}");
    }

    #[test]
    fn registered_font_file_is_drawn_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let font_path = dir.path().join("Caption.ttf");
        std::fs::write(&font_path, include_bytes!("../../storyreel_core/assets/fonts/DejaVuSansMono.ttf")).unwrap();
        let fonts = FontBook::with_dirs(&[dir.path().to_path_buf()]).unwrap();

        let layout = vec![LayoutElement::Text(TextElement {
            color: "white".into(),
            background_color: None,
            font_size: 20.0,
            font_family: Some("Caption".into()),
            position: Position { x: 0.0, y: 0.0 },
            width: 800.0,
            height: 100.0,
            box_border_width: None,
            line_spacing: None,
        })];
        let pages = [page(1, "Hi", None, None)];
        let refs: Vec<&Page> = pages.iter().collect();
        let d = durations(&[5.0]);
        let s = build(&refs, &layout, &StorySettings::default(), &d, d.total(), &MediaInputMap::default(), &fonts)
            .unwrap()
            .filter_string();
        assert!(s.contains("drawtext=fontfile="), "{s}");
        assert!(s.contains("Caption.ttf:text=Hi:"), "{s}");
    }

    #[test]
    fn color_normalization() {
        assert_eq!(normalize_color("#fff").as_deref(), Some("0xFFFFFFFF"));
        assert_eq!(normalize_color("#102030").as_deref(), Some("0x102030FF"));
        assert_eq!(normalize_color("#10203040").as_deref(), Some("0x10203040"));
        assert_eq!(normalize_color("rgba(0, 0, 0, 0.5)").as_deref(), Some("0x00000080"));
        assert_eq!(normalize_color("rgb(255,128,0)").as_deref(), Some("0xFF8000FF"));
        assert_eq!(normalize_color("red@0.5").as_deref(), Some("red@0.5"));
        assert_eq!(normalize_color("#ggg").as_deref(), Some("#ggg"));
        assert_eq!(normalize_color("  "), None);
    }
}
