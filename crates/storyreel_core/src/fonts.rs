//! Font faces that captions are measured against.
//!
//! A [`FontBook`] always holds the bundled DejaVu Sans and DejaVu Sans Mono
//! faces, which are what fontconfig hands drawtext for `Sans` and `monospace`
//! on a stock Linux host. Extra `.ttf`/`.otf` files can be registered from a
//! directory; those are drawn by file path so measurement and rendering use
//! the same outlines.

use fontdue::{Font, FontSettings};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

static SANS_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
static MONO_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono.ttf");

const SANS_ALIASES: &[&str] = &["dejavu sans", "sans", "sans-serif", "helvetica", "arial"];
const MONO_ALIASES: &[&str] = &["dejavu sans mono", "mono", "monospace"];

/// A parsed face and where drawtext can find it.
pub struct Face {
    name: String,
    file: Option<PathBuf>,
    font: Font,
}

impl Face {
    fn bundled(bytes: &[u8], name: &str) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| CoreError::Font(format!("{name}: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            file: None,
            font,
        })
    }

    fn from_file(bytes: &[u8], file: &Path, stem: &str) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| CoreError::Font(format!("{}: {e}", file.display())))?;
        let name = font
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| stem.to_string());
        Ok(Self {
            name,
            file: Some(file.to_path_buf()),
            font,
        })
    }

    /// Family name drawtext is given for bundled faces.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source file, for faces loaded from disk.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Advance width of one line of `text` at `font_size` pixels, kerned.
    pub fn measure(&self, text: &str, font_size: f64) -> f64 {
        let px = font_size as f32;
        let mut width = 0.0f32;
        let mut prev: Option<char> = None;
        for ch in text.chars() {
            // drawtext expands a tab to four spaces.
            let (ch, repeat) = if ch == '\t' { (' ', 4.0) } else { (ch, 1.0) };
            width += self.font.metrics(ch, px).advance_width * repeat;
            if let Some(left) = prev {
                width += self.font.horizontal_kern(left, ch, px).unwrap_or(0.0);
            }
            prev = Some(ch);
        }
        f64::from(width)
    }
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Face")
            .field("name", &self.name)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// Faces keyed by lowercase family name.
#[derive(Debug)]
pub struct FontBook {
    faces: Vec<Face>,
    families: HashMap<String, usize>,
}

impl FontBook {
    /// The bundled faces only.
    pub fn builtin() -> Result<Self> {
        let mut book = Self {
            faces: Vec::new(),
            families: HashMap::new(),
        };
        book.register(Face::bundled(SANS_BYTES, "DejaVu Sans")?, SANS_ALIASES);
        book.register(Face::bundled(MONO_BYTES, "DejaVu Sans Mono")?, MONO_ALIASES);
        Ok(book)
    }

    /// Bundled faces plus every font file found directly under `dirs`.
    pub fn with_dirs(dirs: &[PathBuf]) -> Result<Self> {
        let mut book = Self::builtin()?;
        for dir in dirs {
            let added = book.load_dir(dir)?;
            debug!(dir = %dir.display(), added, "loaded font directory");
        }
        Ok(book)
    }

    /// Register every `.ttf`/`.otf` in `dir`. Unparseable files are skipped
    /// with a warning. Returns how many faces were added.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
            })
            .collect();
        paths.sort();

        let mut added = 0;
        for path in paths {
            match self.add_file(&path) {
                Ok(()) => added += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "skipping font"),
            }
        }
        Ok(added)
    }

    /// Register one font file under its family name and its file stem.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let face = Face::from_file(&bytes, path, &stem)?;
        self.register(face, &[stem.as_str()]);
        Ok(())
    }

    fn register(&mut self, face: Face, aliases: &[&str]) {
        let index = self.faces.len();
        self.families.insert(face.name.to_lowercase(), index);
        for alias in aliases.iter().filter(|a| !a.is_empty()) {
            self.families.insert(alias.to_lowercase(), index);
        }
        self.faces.push(face);
    }

    /// The face for `family`, or the default sans face when it is unset or unknown.
    pub fn face(&self, family: Option<&str>) -> &Face {
        let found = family
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .and_then(|f| self.families.get(&f).copied());
        &self.faces[found.unwrap_or(0)]
    }

    /// Whether `family` names a registered face rather than falling back.
    pub fn knows(&self, family: &str) -> bool {
        self.families.contains_key(&family.trim().to_lowercase())
    }
}
