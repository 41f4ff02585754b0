//! Text shaping for the raster backend.
//!
//! Wrapping is greedy: words fill a line until the next one would exceed
//! the box, and a single word wider than the box gets its own line rather
//! than being split. The SVG backend reuses [`layout_text`] so both
//! backends break lines identically.

use ab_glyph::{Font, ScaleFont, point};
use image::RgbaImage;

use crate::compose::font::{GlyphSource, bitmap_glyph};
use crate::template::{Align, Color};

/// One wrapped line with its measured width.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub width: f32,
}

/// A wrapped text block. Everything is in target-space pixels.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub lines: Vec<Line>,
    pub line_height: f32,
    pub ascent: f32,
    /// Widest line.
    pub width: f32,
    pub height: f32,
}

impl TextBlock {
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.text.is_empty())
    }
}

/// Wrap `value` into lines no wider than `max_width`. Explicit newlines
/// always break; blank input lines survive as empty lines.
pub fn layout_text(value: &str, source: &GlyphSource, font_size: f32, max_width: f32) -> TextBlock {
    let mut lines = Vec::new();

    for paragraph in value.split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0f32;
        let mut wrapped_any = false;

        for word in paragraph.split_whitespace() {
            let word_width = source.measure(word, font_size);
            let space_width = if current.is_empty() {
                0.0
            } else {
                source.advance(' ', font_size)
            };

            if !current.is_empty() && current_width + space_width + word_width > max_width {
                lines.push(Line { text: std::mem::take(&mut current), width: current_width });
                current_width = 0.0;
                wrapped_any = true;
            }
            if !current.is_empty() {
                current.push(' ');
                current_width += space_width;
            }
            current.push_str(word);
            current_width += word_width;
        }

        if !current.is_empty() || !wrapped_any {
            lines.push(Line { text: current, width: current_width });
        }
    }

    let line_height = source.line_height(font_size);
    let ascent = source.ascent(font_size);
    let width = lines.iter().map(|l| l.width).fold(0.0f32, f32::max);
    let height = lines.len() as f32 * line_height;

    TextBlock { lines, line_height, ascent, width, height }
}

/// Rasterize a block into a tight transparent tile. Lines are placed
/// inside the tile according to `align`, so blitting the tile with its
/// left/center/right edge on the field anchor reproduces per-line anchor
/// alignment.
pub fn render_block(
    block: &TextBlock,
    source: &GlyphSource,
    font_size: f32,
    color: Color,
    align: Align,
) -> RgbaImage {
    let tile_w = (block.width.ceil() as u32).max(1);
    let tile_h = (block.height.ceil() as u32).max(1);
    let mut tile = RgbaImage::new(tile_w, tile_h);

    for (i, line) in block.lines.iter().enumerate() {
        let line_x = match align {
            Align::Left => 0.0,
            Align::Center => (block.width - line.width) / 2.0,
            Align::Right => block.width - line.width,
        };
        let line_top = i as f32 * block.line_height;

        match source {
            GlyphSource::Ttf(font) => {
                draw_ttf_line(&mut tile, font, &line.text, font_size, color, line_x, line_top + block.ascent);
            }
            GlyphSource::Bitmap => {
                draw_bitmap_line(&mut tile, source, &line.text, font_size, color, line_x, line_top);
            }
        }
    }

    tile
}

fn draw_ttf_line(
    tile: &mut RgbaImage,
    font: &ab_glyph::FontArc,
    text: &str,
    font_size: f32,
    color: Color,
    start_x: f32,
    baseline_y: f32,
) {
    let scaled = font.as_scaled(font_size);
    let mut caret_x = start_x;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        let glyph = glyph_id.with_scale_and_position(font_size, point(caret_x, baseline_y));
        caret_x += scaled.h_advance(glyph_id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;
                if x >= 0 && y >= 0 && (x as u32) < tile.width() && (y as u32) < tile.height() {
                    let alpha = (coverage * color.a as f32) as u8;
                    let pixel = tile.get_pixel_mut(x as u32, y as u32);
                    // Overlapping glyph edges keep the strongest coverage.
                    if alpha > pixel.0[3] {
                        *pixel = image::Rgba([color.r, color.g, color.b, alpha]);
                    }
                }
            });
        }
    }
}

fn draw_bitmap_line(
    tile: &mut RgbaImage,
    source: &GlyphSource,
    text: &str,
    font_size: f32,
    color: Color,
    start_x: f32,
    line_top: f32,
) {
    let cell_w = source.advance(' ', font_size).round().max(1.0) as usize;
    let cell_h = font_size.round().max(1.0) as usize;
    let mut caret_x = start_x;

    for ch in text.chars() {
        if ch != ' ' {
            let glyph = bitmap_glyph(ch, cell_w, cell_h);
            let origin_x = caret_x.round() as i32;
            let origin_y = line_top.round() as i32;
            for gy in 0..cell_h {
                for gx in 0..cell_w {
                    if glyph[gy * cell_w + gx] == 0 {
                        continue;
                    }
                    let x = origin_x + gx as i32;
                    let y = origin_y + gy as i32;
                    if x >= 0 && y >= 0 && (x as u32) < tile.width() && (y as u32) < tile.height() {
                        tile.put_pixel(x as u32, y as u32, image::Rgba([color.r, color.g, color.b, color.a]));
                    }
                }
            }
        }
        caret_x += source.advance(ch, font_size);
    }
}
