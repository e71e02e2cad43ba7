//! Font resolution and text measurement.
//!
//! Families are looked up as `<font_dir>/<Family>.ttf` (or `.otf`) the first
//! time a template references them. A family that cannot be found falls back
//! to the default font; the miss is logged once and never fails a render.
//!
//! The default font is DejaVu Sans, compiled into the binary, unless a
//! font file is configured in its place.

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::PlacardError;
use crate::template::fit::TextMeasure;

static DEJAVU_SANS: OnceLock<FontArc> = OnceLock::new();

/// The built-in default font.
pub fn embedded_font() -> &'static FontArc {
    DEJAVU_SANS.get_or_init(|| {
        FontArc::try_from_slice(include_bytes!("fonts/DejaVuSans.ttf"))
            .expect("Failed to load DejaVu Sans")
    })
}

/// Registered fonts by family name, plus a fallback.
///
/// Cloning is cheap: fonts are reference counted.
#[derive(Clone)]
pub struct FontBook {
    dir: PathBuf,
    fonts: HashMap<String, FontArc>,
    fallback: FontArc,
    custom_fallback: bool,
    missing: HashSet<String>,
}

impl Default for FontBook {
    fn default() -> Self {
        Self {
            dir: PathBuf::new(),
            fonts: HashMap::new(),
            fallback: embedded_font().clone(),
            custom_fallback: false,
            missing: HashSet::new(),
        }
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("dir", &self.dir)
            .field("families", &self.fonts.keys().collect::<Vec<_>>())
            .field("custom_fallback", &self.custom_fallback)
            .finish()
    }
}

impl FontBook {
    /// Create a book that resolves families from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Replace the built-in fallback with a font file.
    pub fn load_fallback(&mut self, path: &Path) -> Result<(), PlacardError> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| {
            PlacardError::Render(format!("invalid font file {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "default font loaded");
        self.fallback = font;
        self.custom_fallback = true;
        Ok(())
    }

    /// Register a font from raw TTF/OTF bytes under `family`.
    pub fn register_bytes(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), PlacardError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| PlacardError::Render(format!("invalid font for {}: {}", family, e)))?;
        self.fonts.insert(family.to_string(), font);
        self.missing.remove(family);
        Ok(())
    }

    /// Make `family` available, loading it from the font directory if needed.
    ///
    /// Returns `false` (after logging) when no usable file exists; text in
    /// that family will use the fallback font.
    pub fn register(&mut self, family: &str) -> bool {
        if self.fonts.contains_key(family) {
            return true;
        }
        if self.missing.contains(family) || !is_safe_family(family) {
            return false;
        }

        for ext in ["ttf", "otf"] {
            let path = self.dir.join(format!("{}.{}", family, ext));
            debug!(path = %path.display(), "attempting to register font");
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match self.register_bytes(family, bytes) {
                Ok(()) => {
                    info!(family, path = %path.display(), "font registered");
                    return true;
                }
                Err(e) => warn!(family, error = %e, "font file unusable"),
            }
        }

        warn!(family, dir = %self.dir.display(), "font not found, using default font");
        self.missing.insert(family.to_string());
        false
    }

    /// Register every family in `families`. Returns how many resolved.
    pub fn register_all<I, S>(&mut self, families: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        families
            .into_iter()
            .filter(|f| self.register(f.as_ref()))
            .count()
    }

    /// Font for `family`, or the fallback.
    pub fn resolve(&self, family: Option<&str>) -> &FontArc {
        family
            .and_then(|f| self.fonts.get(f))
            .unwrap_or(&self.fallback)
    }

    /// Whether the fallback was loaded from a file rather than built in.
    pub fn has_custom_fallback(&self) -> bool {
        self.custom_fallback
    }
}

/// Family names become file names; refuse anything that could leave the directory.
fn is_safe_family(family: &str) -> bool {
    !family.is_empty()
        && !family.contains(['/', '\\'])
        && !family.contains("..")
        && !family.starts_with('.')
}

/// Pixel scale for a CSS-style font size (em size in pixels).
///
/// ab_glyph scales by ascent-to-descent height, so convert from em units.
pub fn px_scale(font: &FontArc, font_size: f32) -> PxScale {
    let units_per_em = font.units_per_em().unwrap_or(1000.0);
    PxScale::from(font_size * font.height_unscaled() / units_per_em)
}

/// Glyph ids and pen positions for one line, plus its advance width.
pub fn layout_line(font: &FontArc, scale: PxScale, text: &str) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(scale);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut caret_x = 0.0f32;
    let mut previous: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = previous {
            caret_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, caret_x));
        caret_x += scaled.h_advance(glyph_id);
        previous = Some(glyph_id);
    }

    (glyphs, caret_x)
}

impl TextMeasure for FontBook {
    fn line_width(&self, family: Option<&str>, font_size: f32, text: &str) -> f32 {
        let font = self.resolve(family);
        layout_line(font, px_scale(font, font_size), text).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_family_names() {
        assert!(is_safe_family("Lobster"));
        assert!(is_safe_family("Open Sans"));
        assert!(!is_safe_family("../etc/passwd"));
        assert!(!is_safe_family("a/b"));
        assert!(!is_safe_family(""));
        assert!(!is_safe_family(".hidden"));
    }

    #[test]
    fn test_missing_font_uses_embedded_default() {
        let dir = std::env::temp_dir().join(format!("placard-fonts-{}", uuid::Uuid::new_v4()));
        let mut book = FontBook::new(&dir);
        assert!(!book.register("Lobster"));
        // Remembered as missing; second lookup does not hit the disk again
        assert!(!book.register("Lobster"));

        let lobster = book.line_width(Some("Lobster"), 24.0, "hello");
        let default = book.line_width(None, 24.0, "hello");
        assert!(lobster > 0.0);
        assert_eq!(lobster, default);
    }

    #[test]
    fn test_embedded_width_is_linear_in_size() {
        let book = FontBook::default();
        let small = book.line_width(None, 20.0, "Hello World");
        let large = book.line_width(None, 40.0, "Hello World");
        assert!(small > 0.0);
        assert!((large - 2.0 * small).abs() < 1e-2, "{small} vs {large}");
    }

    #[test]
    fn test_registered_family_wins_over_fallback() {
        let mut book = FontBook::default();
        book.register_bytes("Brand", include_bytes!("fonts/DejaVuSans.ttf").to_vec())
            .unwrap();
        assert!(book.register("Brand"));
        assert_eq!(
            book.line_width(Some("Brand"), 30.0, "abc"),
            book.line_width(None, 30.0, "abc")
        );
    }

    #[test]
    fn test_invalid_font_bytes_rejected() {
        let mut book = FontBook::default();
        let err = book.register_bytes("Broken", b"not a font".to_vec()).unwrap_err();
        assert!(matches!(err, PlacardError::Render(_)));
        assert!(!book.register("Broken"));
    }

    #[test]
    fn test_unreadable_fallback_is_io_error() {
        let mut book = FontBook::default();
        let err = book
            .load_fallback(Path::new("/definitely/not/here.ttf"))
            .unwrap_err();
        assert!(matches!(err, PlacardError::Io(_)));
        assert!(!book.has_custom_fallback());
    }
}
