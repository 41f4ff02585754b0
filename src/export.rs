//! # Export / Quality Controller
//!
//! Applies the quality tier to a finished surface and encodes PNG bytes.
//! Quality never touches layout: geometry is computed for the requested
//! target size, and the pixel ratio only multiplies raster density at
//! the very end. Doubling quality doubles pixels, not positions.

use image::RgbaImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::PlacardError;

/// Output quality tier. Controls raster density only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    #[default]
    Preview,
    Medium,
    High,
}

impl QualityTier {
    pub fn pixel_ratio(self) -> PixelRatio {
        match self {
            QualityTier::Preview => PixelRatio(1.0),
            QualityTier::Medium => PixelRatio(1.5),
            QualityTier::High => PixelRatio(2.0),
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QualityTier::Preview => "preview",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        };
        write!(f, "{name}")
    }
}

/// Raster density multiplier. Deliberately a distinct type from the
/// layout scale factor: the two must never be multiplied into each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRatio(f32);

impl PixelRatio {
    pub fn value(self) -> f32 {
        self.0
    }

    pub fn is_identity(self) -> bool {
        self.0 == 1.0
    }

    /// Output raster dimension for a layout dimension.
    pub fn apply(self, dim: u32) -> u32 {
        ((dim as f32 * self.0).round() as u32).max(1)
    }
}

/// Scale a finished surface by the tier's pixel ratio and encode PNG.
pub fn rasterize(surface: &RgbaImage, tier: QualityTier) -> Result<Vec<u8>, PlacardError> {
    let ratio = tier.pixel_ratio();
    if ratio.is_identity() {
        return encode_png(surface);
    }

    let scaled = image::imageops::resize(
        surface,
        ratio.apply(surface.width()),
        ratio.apply(surface.height()),
        FilterType::Lanczos3,
    );
    encode_png(&scaled)
}

/// Encode an RGBA surface as PNG bytes.
pub fn encode_png(surface: &RgbaImage) -> Result<Vec<u8>, PlacardError> {
    use image::ImageEncoder;

    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder
        .write_image(
            surface.as_raw(),
            surface.width(),
            surface.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e: image::ImageError| PlacardError::Encode(e.to_string()))?;

    Ok(png_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn surface(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([80, 90, 100, 255]))
    }

    #[test]
    fn test_tier_ratios() {
        assert_eq!(QualityTier::Preview.pixel_ratio().value(), 1.0);
        assert_eq!(QualityTier::Medium.pixel_ratio().value(), 1.5);
        assert_eq!(QualityTier::High.pixel_ratio().value(), 2.0);
    }

    #[test]
    fn test_tier_parses_from_json() {
        let tier: QualityTier = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(tier, QualityTier::High);
        let tier: QualityTier = serde_json::from_str("\"preview\"").unwrap();
        assert_eq!(tier, QualityTier::Preview);
    }

    #[test]
    fn test_ratio_dimension_math() {
        let ratio = QualityTier::Medium.pixel_ratio();
        assert_eq!(ratio.apply(800), 1200);
        assert_eq!(ratio.apply(333), 500); // 499.5 rounds up
    }

    #[test]
    fn test_preview_encodes_at_layout_size() {
        let png = rasterize(&surface(120, 80), QualityTier::Preview).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn test_high_doubles_raster_dims() {
        let png = rasterize(&surface(120, 80), QualityTier::High).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (240, 160));
    }

    #[test]
    fn test_medium_scales_by_half_step() {
        let png = rasterize(&surface(120, 80), QualityTier::Medium).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (180, 120));
    }

    #[test]
    fn test_png_signature() {
        let png = encode_png(&surface(4, 4)).unwrap();
        assert_eq!(&png[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
