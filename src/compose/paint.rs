//! Raster paint backend.
//!
//! Executes a [`PaintPlan`](crate::compose::PaintPlan) onto an RGBA
//! surface: background fitted first, then each command in plan order.
//! Text runs rasterize into transparent tiles (shadow pass underneath)
//! which are then blitted, rotated around the field anchor when needed.
//! Image fields whose asset failed to decode paint a crossed-out
//! placeholder box instead of aborting the render.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage, imageops};
use std::collections::HashMap;
use std::sync::Arc;

use crate::compose::font::FontLibrary;
use crate::compose::text::{layout_text, render_block};
use crate::compose::{ImagePaint, PaintCommand, PaintPlan, TextPaint};
use crate::template::{Align, FitMode};

/// Paint a whole plan. `images` maps resolved image-field sources to
/// their decoded pixels; anything missing gets a placeholder.
pub fn render_surface(
    plan: &PaintPlan,
    background: &DynamicImage,
    images: &HashMap<String, Arc<DynamicImage>>,
    fonts: &FontLibrary,
) -> RgbaImage {
    let mut canvas = fit_background(background, plan.width, plan.height, plan.background.fit);

    for command in &plan.commands {
        match command {
            PaintCommand::Text(text) => paint_text(&mut canvas, text, fonts),
            PaintCommand::Image(img) => paint_image(&mut canvas, img, images),
        }
    }

    canvas
}

/// Fit a background image to the target dimensions.
pub fn fit_background(source: &DynamicImage, width: u32, height: u32, fit: FitMode) -> RgbaImage {
    let (sw, sh) = (source.width().max(1), source.height().max(1));

    match fit {
        FitMode::Stretch => source
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgba8(),
        FitMode::Cover => {
            let scale = (width as f32 / sw as f32).max(height as f32 / sh as f32);
            let rw = ((sw as f32 * scale).ceil() as u32).max(width);
            let rh = ((sh as f32 * scale).ceil() as u32).max(height);
            let resized = source.resize_exact(rw, rh, FilterType::Lanczos3);
            let left = (rw - width) / 2;
            let top = (rh - height) / 2;
            resized.crop_imm(left, top, width, height).to_rgba8()
        }
        FitMode::Contain => {
            let scale = (width as f32 / sw as f32).min(height as f32 / sh as f32);
            let rw = ((sw as f32 * scale).round() as u32).clamp(1, width);
            let rh = ((sh as f32 * scale).round() as u32).clamp(1, height);
            let resized = source.resize_exact(rw, rh, FilterType::Lanczos3).to_rgba8();
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
            let left = ((width - rw) / 2) as i64;
            let top = ((height - rh) / 2) as i64;
            alpha_blit(&mut canvas, &resized, left, top);
            canvas
        }
    }
}

fn paint_text(canvas: &mut RgbaImage, cmd: &TextPaint, fonts: &FontLibrary) {
    let source = fonts.select(cmd.font_family.as_deref(), cmd.font_weight);
    let font_size = cmd.font_size as f32;
    let block = layout_text(&cmd.value, &source, font_size, cmd.max_width as f32);
    if block.is_empty() {
        return;
    }

    let main = render_block(&block, &source, font_size, cmd.color, cmd.align);

    // Compose shadow under the glyphs in one padded tile so rotation
    // transforms both together.
    let (tile, pad) = match cmd.shadow {
        Some(shadow) => {
            let pad = shadow
                .blur
                .saturating_mul(2)
                .saturating_add(shadow.offset_x.unsigned_abs().max(shadow.offset_y.unsigned_abs()));
            let mut combined = RgbaImage::new(
                main.width().saturating_add(pad.saturating_mul(2)),
                main.height().saturating_add(pad.saturating_mul(2)),
            );

            let shadow_tile = render_block(&block, &source, font_size, shadow.color, cmd.align);
            let blurred = if shadow.blur > 0 {
                imageops::blur(&shadow_tile, shadow.blur as f32 / 2.0)
            } else {
                shadow_tile
            };
            alpha_blit(
                &mut combined,
                &blurred,
                pad as i64 + shadow.offset_x as i64,
                pad as i64 + shadow.offset_y as i64,
            );
            alpha_blit(&mut combined, &main, pad as i64, pad as i64);
            (combined, pad)
        }
        None => (main, 0),
    };

    // The anchor sits on the aligned edge of the unpadded block.
    let align_offset = match cmd.align {
        Align::Left => 0.0,
        Align::Center => block.width.ceil() / 2.0,
        Align::Right => block.width.ceil(),
    };
    let anchor_in_tile = (pad as f32 + align_offset, pad as f32);

    place_tile(canvas, &tile, cmd.x, cmd.y, anchor_in_tile, cmd.rotation);
}

fn paint_image(canvas: &mut RgbaImage, cmd: &ImagePaint, images: &HashMap<String, Arc<DynamicImage>>) {
    let target_w = cmd.max_width.max(1);

    let tile = match images.get(&cmd.source) {
        Some(decoded) => {
            let aspect = decoded.height().max(1) as f32 / decoded.width().max(1) as f32;
            let target_h = ((target_w as f32 * aspect).round() as u32).max(1);
            decoded
                .resize_exact(target_w, target_h, FilterType::Lanczos3)
                .to_rgba8()
        }
        None => {
            log::warn!("image field {:?}: no decoded asset for {:?}, painting placeholder", cmd.name, cmd.source);
            placeholder_tile(target_w, (target_w * 3 / 4).max(1))
        }
    };

    // Image fields anchor at their top-left corner.
    place_tile(canvas, &tile, cmd.x, cmd.y, (0.0, 0.0), cmd.rotation);
}

fn place_tile(canvas: &mut RgbaImage, tile: &RgbaImage, x: f32, y: f32, anchor: (f32, f32), rotation: f32) {
    if rotation == 0.0 {
        alpha_blit(
            canvas,
            tile,
            (x - anchor.0).round() as i64,
            (y - anchor.1).round() as i64,
        );
    } else {
        rotate_blit(canvas, tile, x, y, anchor, rotation);
    }
}

/// Source-over blit with signed offsets; out-of-canvas pixels clip.
pub fn alpha_blit(canvas: &mut RgbaImage, tile: &RgbaImage, x: i64, y: i64) {
    for ty in 0..tile.height() {
        let cy = y + ty as i64;
        if cy < 0 || cy >= canvas.height() as i64 {
            continue;
        }
        for tx in 0..tile.width() {
            let cx = x + tx as i64;
            if cx < 0 || cx >= canvas.width() as i64 {
                continue;
            }
            let src = *tile.get_pixel(tx, ty);
            if src.0[3] == 0 {
                continue;
            }
            let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
            *dst = blend_over(src, *dst);
        }
    }
}

/// Standard source-over blending that keeps destination alpha correct,
/// so tiles can compose onto transparent buffers as well as the canvas.
fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, d: u8| {
        ((s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a).round() as u8
    };
    Rgba([
        channel(src.0[0], dst.0[0]),
        channel(src.0[1], dst.0[1]),
        channel(src.0[2], dst.0[2]),
        (out_a * 255.0).round() as u8,
    ])
}

/// Rotate a tile around the field anchor and blend it onto the canvas.
/// Inverse-maps each destination pixel and samples the tile bilinearly.
fn rotate_blit(canvas: &mut RgbaImage, tile: &RgbaImage, ax: f32, ay: f32, anchor: (f32, f32), degrees: f32) {
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (taw, tah) = anchor;
    let (tw, th) = (tile.width() as f32, tile.height() as f32);

    // Bounding box of the rotated tile in canvas space.
    let corners = [(0.0, 0.0), (tw, 0.0), (0.0, th), (tw, th)];
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (cx, cy) in corners {
        let dx = cx - taw;
        let dy = cy - tah;
        let rx = ax + dx * cos - dy * sin;
        let ry = ay + dx * sin + dy * cos;
        min_x = min_x.min(rx);
        min_y = min_y.min(ry);
        max_x = max_x.max(rx);
        max_y = max_y.max(ry);
    }

    let x0 = (min_x.floor() as i64).max(0);
    let y0 = (min_y.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64 + 1).min(canvas.width() as i64);
    let y1 = (max_y.ceil() as i64 + 1).min(canvas.height() as i64);

    for cy in y0..y1 {
        for cx in x0..x1 {
            let dx = cx as f32 + 0.5 - ax;
            let dy = cy as f32 + 0.5 - ay;
            // Inverse rotation back into tile space.
            let sx = dx * cos + dy * sin + taw - 0.5;
            let sy = -dx * sin + dy * cos + tah - 0.5;
            let src = sample_bilinear(tile, sx, sy);
            if src.0[3] == 0 {
                continue;
            }
            let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
            *dst = blend_over(src, *dst);
        }
    }
}

fn sample_bilinear(tile: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = (tile.width() as i64, tile.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let fetch = |px: i64, py: i64| -> [f32; 4] {
        if px < 0 || py < 0 || px >= w || py >= h {
            [0.0; 4]
        } else {
            let p = tile.get_pixel(px as u32, py as u32).0;
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    Rgba(out)
}

/// Crossed-out box for image fields whose asset never decoded.
fn placeholder_tile(width: u32, height: u32) -> RgbaImage {
    let mut tile = RgbaImage::from_pixel(width, height, Rgba([220, 220, 220, 255]));
    let border = Rgba([120, 120, 120, 255]);

    for x in 0..width {
        tile.put_pixel(x, 0, border);
        tile.put_pixel(x, height - 1, border);
    }
    for y in 0..height {
        tile.put_pixel(0, y, border);
        tile.put_pixel(width - 1, y, border);
    }
    // X pattern across the box
    for i in 0..height {
        let x1 = (i as u64 * (width as u64 - 1) / (height as u64 - 1).max(1)) as u32;
        let x2 = width - 1 - x1;
        tile.put_pixel(x1, i, border);
        tile.put_pixel(x2, i, border);
    }

    tile
}
