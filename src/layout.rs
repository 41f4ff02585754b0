//! # Field Layout Normalizer
//!
//! Converts percentage-based field positions and canonical style values
//! into absolute pixel geometry for a requested target size. All geometry
//! math lives here; paint backends consume the output and add nothing.
//!
//! Scaling is anchored to a canonical canvas width ([`CANONICAL_WIDTH`]):
//! a template authored at 1000px renders at any target width through a
//! single scale factor. The raster density multiplier applied at export
//! time ([`crate::export::PixelRatio`]) is a different axis entirely and
//! deliberately a different type; it never feeds back into these numbers.

use serde::{Deserialize, Serialize};

use crate::error::PlacardError;
use crate::template::value::ValueContext;
use crate::template::{Align, Color, Field, FieldKind, FontWeight};

/// Width of the canonical canvas every template is authored against.
pub const CANONICAL_WIDTH: f32 = 1000.0;

/// Bumped whenever the geometry contract changes shape or meaning.
/// Snapshots carry it so cross-environment comparison fails fast on skew.
pub const LAYOUT_SCHEMA_VERSION: u32 = 1;

/// Canonical font size used when a field specifies none.
pub const DEFAULT_FONT_SIZE: f32 = 24.0;
/// Canonical font size clamp range, applied before scaling.
pub const MIN_FONT_SIZE: f32 = 14.0;
pub const MAX_FONT_SIZE: f32 = 60.0;

/// Canonical shadow offset (both axes), default blur radius, and the
/// blur ceiling author values clamp to.
const SHADOW_OFFSET: f32 = 2.0;
const DEFAULT_SHADOW_BLUR: f32 = 3.0;
const MAX_SHADOW_BLUR: f32 = 25.0;

/// Canonical inset subtracted from the canvas width when a field has no
/// explicit wrapping width, and the ceiling explicit widths clamp to.
const DEFAULT_MAX_WIDTH_INSET: f32 = 50.0;
const MAX_MAX_WIDTH: f32 = 2.0 * CANONICAL_WIDTH;

/// Ratio between a target width and the canonical canvas width.
///
/// A newtype rather than a bare f32 so layout scaling can never be
/// confused with the export-time pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactor(f32);

impl ScaleFactor {
    pub fn for_target(target_width: u32) -> Self {
        Self(target_width as f32 / CANONICAL_WIDTH)
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Scale a canonical length into target space.
    pub fn apply(self, canonical: f32) -> f32 {
        canonical * self.0
    }

    /// Scale and round to whole pixels (negative results floor at zero).
    pub fn apply_px(self, canonical: f32) -> u32 {
        round_px(self.apply(canonical))
    }
}

fn round_px(v: f32) -> u32 {
    v.round().max(0.0) as u32
}

/// Shadow geometry in target-space pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderedShadow {
    pub offset_x: i32,
    pub offset_y: i32,
    pub blur: u32,
    pub color: Color,
}

/// One field after normalization: absolute geometry plus everything a
/// paint backend needs to draw it. Hidden fields are included (callers
/// inspect `visible`); the compositor drops them from the paint plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedField {
    pub name: String,
    pub kind: FieldKind,
    /// Anchor in target-space pixels (sub-pixel precision kept).
    pub x: f32,
    pub y: f32,
    /// Whole-pixel font size after clamp and scale.
    pub font_size: u32,
    /// Wrapping-box width in target-space pixels.
    pub max_width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<RenderedShadow>,
    /// Degrees around the anchor, unscaled.
    pub rotation: f32,
    pub z_index: i32,
    pub visible: bool,
    /// Final resolved value (fallback chain + interpolation already applied).
    pub value: String,
    pub font_family: Option<String>,
    pub font_weight: FontWeight,
    pub color: Color,
    pub align: Align,
}

/// Normalize every field for the given target size.
///
/// Output order matches input order; the z-order sort happens in the
/// compositor. Invalid style numerics degrade to defaults with a warning
/// rather than failing the render.
pub fn normalize(
    fields: &[Field],
    values: &ValueContext<'_>,
    target_width: u32,
    target_height: u32,
) -> Result<Vec<RenderedField>, PlacardError> {
    if target_width == 0 || target_height == 0 {
        return Err(PlacardError::InvalidRequest(format!(
            "target dimensions must be positive, got {target_width}x{target_height}"
        )));
    }

    let scale = ScaleFactor::for_target(target_width);
    Ok(fields
        .iter()
        .map(|field| normalize_field(field, values.resolve(field), scale, target_width, target_height))
        .collect())
}

fn normalize_field(
    field: &Field,
    value: String,
    scale: ScaleFactor,
    target_width: u32,
    target_height: u32,
) -> RenderedField {
    let x = sanitize_percent(field.name.as_str(), "x", field.position.x) / 100.0
        * target_width as f32;
    let y = sanitize_percent(field.name.as_str(), "y", field.position.y) / 100.0
        * target_height as f32;

    let style = &field.style;

    let base_size = match style.font_size {
        Some(size) if size.is_finite() && size > 0.0 => size,
        Some(bad) => {
            log::warn!("field {:?}: invalid font size {bad}, using default", field.name);
            DEFAULT_FONT_SIZE
        }
        None => DEFAULT_FONT_SIZE,
    };
    let clamped = base_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
    if clamped != base_size {
        log::warn!(
            "field {:?}: font size {base_size} clamped to {clamped}",
            field.name
        );
    }
    // Clamp in canonical units, then scale. Scaling first would let tiny
    // targets defeat the minimum and huge ones defeat the maximum.
    let font_size = scale.apply_px(clamped);

    let max_width = match style.max_width {
        Some(w) if w.is_finite() && w > 0.0 => {
            let clamped = w.min(MAX_MAX_WIDTH);
            if clamped != w {
                log::warn!(
                    "field {:?}: max width {w} clamped to {clamped}",
                    field.name
                );
            }
            scale.apply_px(clamped)
        }
        Some(bad) => {
            log::warn!("field {:?}: invalid max width {bad}, using default", field.name);
            default_max_width(scale, target_width)
        }
        None => default_max_width(scale, target_width),
    };

    let shadow = style.shadow.enabled.then(|| {
        // Blur clamps in canonical units, same rule as the font size.
        let blur = match style.shadow.blur {
            Some(b) if b.is_finite() && b >= 0.0 => {
                let clamped = b.min(MAX_SHADOW_BLUR);
                if clamped != b {
                    log::warn!(
                        "field {:?}: shadow blur {b} clamped to {clamped}",
                        field.name
                    );
                }
                clamped
            }
            Some(bad) => {
                log::warn!("field {:?}: invalid shadow blur {bad}, using default", field.name);
                DEFAULT_SHADOW_BLUR
            }
            None => DEFAULT_SHADOW_BLUR,
        };
        let offset = scale.apply(SHADOW_OFFSET).round() as i32;
        RenderedShadow {
            offset_x: offset,
            offset_y: offset,
            blur: scale.apply_px(blur),
            color: style.shadow.color,
        }
    });

    let rotation = if field.rotation.is_finite() {
        field.rotation
    } else {
        log::warn!("field {:?}: invalid rotation, using 0", field.name);
        0.0
    };

    RenderedField {
        name: field.name.clone(),
        kind: field.kind,
        x,
        y,
        font_size,
        max_width,
        shadow,
        rotation,
        z_index: field.z_index,
        visible: field.visible,
        value,
        font_family: style.font_family.clone(),
        font_weight: style.font_weight,
        color: style.color,
        align: style.align,
    }
}

fn default_max_width(scale: ScaleFactor, target_width: u32) -> u32 {
    round_px(target_width as f32 - scale.apply(DEFAULT_MAX_WIDTH_INSET))
}

fn sanitize_percent(field: &str, axis: &str, v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        log::warn!("field {field:?}: invalid {axis} position, using 0");
        0.0
    }
}
