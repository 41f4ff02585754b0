//! Font registry and glyph metrics.
//!
//! TTF/OTF faces register at startup (usually from a fonts directory) and
//! are selected per field by family name and weight. When no registered
//! face matches, text falls back to the Spleen 12x24 bitmap face, which
//! ships with the crate and keeps rendering deterministic on hosts with
//! no fonts installed.

use ab_glyph::{Font, FontArc, ScaleFont};
use spleen_font::{FONT_12X24, PSF2Font};
use std::collections::HashMap;
use std::path::Path;

use crate::error::PlacardError;
use crate::template::FontWeight;

/// Spleen cell geometry: every glyph is 12x24 with the baseline near
/// row 20.
const BITMAP_CELL_W: usize = 12;
const BITMAP_CELL_H: usize = 24;
const BITMAP_ASCENT_RATIO: f32 = 20.0 / 24.0;

/// Where glyphs for a text run come from.
#[derive(Clone)]
pub enum GlyphSource {
    Ttf(FontArc),
    /// Spleen bitmap fallback, scaled nearest-neighbor to the font size.
    Bitmap,
}

impl std::fmt::Debug for GlyphSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphSource::Ttf(_) => write!(f, "GlyphSource::Ttf"),
            GlyphSource::Bitmap => write!(f, "GlyphSource::Bitmap"),
        }
    }
}

impl GlyphSource {
    /// Horizontal advance for one character at the given pixel size.
    pub fn advance(&self, ch: char, font_size: f32) -> f32 {
        match self {
            GlyphSource::Ttf(font) => {
                let scaled = font.as_scaled(font_size);
                scaled.h_advance(font.glyph_id(ch))
            }
            GlyphSource::Bitmap => {
                font_size * BITMAP_CELL_W as f32 / BITMAP_CELL_H as f32
            }
        }
    }

    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        text.chars().map(|ch| self.advance(ch, font_size)).sum()
    }

    /// Distance from the top of a line to the baseline.
    pub fn ascent(&self, font_size: f32) -> f32 {
        match self {
            GlyphSource::Ttf(font) => font.as_scaled(font_size).ascent(),
            GlyphSource::Bitmap => font_size * BITMAP_ASCENT_RATIO,
        }
    }

    pub fn line_height(&self, font_size: f32) -> f32 {
        match self {
            GlyphSource::Ttf(font) => {
                let scaled = font.as_scaled(font_size);
                (scaled.ascent() - scaled.descent()).ceil()
            }
            GlyphSource::Bitmap => font_size,
        }
    }
}

/// Registered fonts, keyed by lowercase family name.
#[derive(Default)]
pub struct FontLibrary {
    fonts: HashMap<String, FontArc>,
}

impl FontLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a face under a family name. `"inter-bold"` style names
    /// participate in bold selection for the `"inter"` family.
    pub fn register(&mut self, family: impl Into<String>, bytes: Vec<u8>) -> Result<(), PlacardError> {
        let family = family.into().to_ascii_lowercase();
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| PlacardError::Font(format!("invalid font data for {family:?}: {e}")))?;
        self.fonts.insert(family, font);
        Ok(())
    }

    /// Load every `.ttf`/`.otf` in a directory, keyed by file stem.
    /// Unparseable files are skipped with a warning. Returns how many
    /// faces were registered.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, PlacardError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
            if !is_font {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let family = stem.to_ascii_lowercase();
            match std::fs::read(&path) {
                Ok(bytes) => match self.register(family.clone(), bytes) {
                    Ok(()) => loaded += 1,
                    Err(e) => log::warn!("skipping font {}: {e}", path.display()),
                },
                Err(e) => log::warn!("skipping unreadable font {}: {e}", path.display()),
            }
        }
        log::info!("registered {loaded} font(s) from {}", dir.display());
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Pick a glyph source for a field. Bold requests try `{family}-bold`
    /// first, then the plain family. Unknown families fall back to the
    /// bitmap face with a warning.
    pub fn select(&self, family: Option<&str>, weight: FontWeight) -> GlyphSource {
        if let Some(requested) = family {
            let key = requested.to_ascii_lowercase();
            if weight.is_bold()
                && let Some(font) = self.fonts.get(&format!("{key}-bold"))
            {
                return GlyphSource::Ttf(font.clone());
            }
            if let Some(font) = self.fonts.get(&key) {
                return GlyphSource::Ttf(font.clone());
            }
            log::warn!("font family {requested:?} not registered, using bitmap fallback");
        }
        GlyphSource::Bitmap
    }
}

/// Rasterize one bitmap-fallback glyph into a `cell_w` x `cell_h` buffer
/// of 0/1 bytes. Characters missing from Spleen render as a box outline.
pub fn bitmap_glyph(ch: char, cell_w: usize, cell_h: usize) -> Vec<u8> {
    let mut glyph = vec![0u8; cell_w * cell_h];
    if cell_w == 0 || cell_h == 0 {
        return glyph;
    }

    let mut spleen = PSF2Font::new(FONT_12X24).unwrap();
    let utf8 = ch.to_string();

    if let Some(spleen_glyph) = spleen.glyph_for_utf8(utf8.as_bytes()) {
        let mut base = vec![0u8; BITMAP_CELL_W * BITMAP_CELL_H];
        for (row_y, row) in spleen_glyph.enumerate() {
            for (col_x, on) in row.enumerate() {
                if row_y < BITMAP_CELL_H && col_x < BITMAP_CELL_W {
                    base[row_y * BITMAP_CELL_W + col_x] = if on { 1 } else { 0 };
                }
            }
        }
        scale_bitmap(&base, BITMAP_CELL_W, BITMAP_CELL_H, &mut glyph, cell_w, cell_h);
    } else {
        draw_box(&mut glyph, cell_w, cell_h);
    }

    glyph
}

/// Nearest-neighbor bitmap scale.
fn scale_bitmap(src: &[u8], src_w: usize, src_h: usize, dst: &mut [u8], dst_w: usize, dst_h: usize) {
    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx * src_w / dst_w;
            let sy = dy * src_h / dst_h;
            let src_idx = sy * src_w + sx;
            let dst_idx = dy * dst_w + dx;
            if src_idx < src.len() && dst_idx < dst.len() {
                dst[dst_idx] = src[src_idx];
            }
        }
    }
}

/// Box outline for characters with no glyph.
fn draw_box(glyph: &mut [u8], width: usize, height: usize) {
    for x in 0..width {
        glyph[x] = 1;
        glyph[(height - 1) * width + x] = 1;
    }
    for y in 0..height {
        glyph[y * width] = 1;
        glyph[y * width + width - 1] = 1;
    }
}
