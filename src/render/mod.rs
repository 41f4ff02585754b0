//! # Render Pipeline
//!
//! Orchestrates one render end to end: fetch the background, freeze the
//! target size, resolve values, normalize geometry, build the paint
//! plan, fetch field images, paint, encode. A render moves through
//! `Requested → Resolving → Normalizing → Compositing → Rasterized`,
//! and every error names the phase it died in.
//!
//! The pipeline splits at `prepare()`: everything before it awaits
//! external assets, everything after is pure CPU over owned data. The
//! server runs the CPU half on a blocking thread; the batch module runs
//! many of them on a worker pool.

pub mod batch;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::assets::AssetStore;
use crate::compose::font::FontLibrary;
use crate::compose::{self, PaintCommand, PaintPlan, paint, svg};
use crate::error::PlacardError;
use crate::export::{self, QualityTier};
use crate::layout::{self, RenderedField};
use crate::parity::GeometrySnapshot;
use crate::template::value::ValueContext;
use crate::template::{FormData, Template};

/// Everything one render needs, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub template: Template,
    #[serde(default)]
    pub data: FormData,
    /// Extra interpolation variables, merged over the builtins.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub target_width: u32,
    /// Derived from the background's aspect ratio when absent.
    #[serde(default)]
    pub target_height: Option<u32>,
    #[serde(default)]
    pub quality: QualityTier,
}

impl RenderRequest {
    pub fn new(template: Template, data: FormData, target_width: u32) -> Self {
        Self {
            template,
            data,
            variables: BTreeMap::new(),
            target_width,
            target_height: None,
            quality: QualityTier::default(),
        }
    }

    /// Canonical JSON of the whole request. All maps inside serialize in
    /// key order, so two requests produce the same key exactly when every
    /// render input matches. Memo caches keyed on it invalidate
    /// structurally on any field or style change.
    pub fn canonical_key(&self) -> Result<String, PlacardError> {
        serde_json::to_string(self).map_err(|e| PlacardError::InvalidRequest(e.to_string()))
    }
}

/// Output size for a request: explicit height wins, otherwise the
/// background's natural aspect ratio applied to the target width.
fn target_size(request: &RenderRequest, background: &DynamicImage) -> Result<(u32, u32), PlacardError> {
    if request.target_width == 0 {
        return Err(PlacardError::InvalidRequest(
            "target_width must be positive".into(),
        ));
    }
    let height = match request.target_height {
        Some(h) if h > 0 => h,
        Some(_) => {
            return Err(PlacardError::InvalidRequest(
                "target_height must be positive".into(),
            ));
        }
        None => {
            let aspect = background.height() as f32 / background.width() as f32;
            ((request.target_width as f32 * aspect).round() as u32).max(1)
        }
    };
    Ok((request.target_width, height))
}

/// A render with all assets fetched and geometry frozen.
///
/// Holds everything the paint phase reads, so it can move onto a
/// blocking thread or a worker pool. Decoded assets are `Arc` handles
/// shared with the store's cache: prepared rows that reuse a background
/// reference one pixel buffer instead of carrying a copy each.
#[derive(Debug)]
pub struct PreparedRender {
    pub background: Arc<DynamicImage>,
    /// Decoded field images keyed by resolved source reference.
    pub images: HashMap<String, Arc<DynamicImage>>,
    pub fields: Vec<RenderedField>,
    pub plan: PaintPlan,
    pub width: u32,
    pub height: u32,
    pub quality: QualityTier,
}

impl PreparedRender {
    /// Pure CPU phase: paint the surface and encode at the quality tier.
    pub fn rasterize(&self, fonts: &FontLibrary) -> Result<Vec<u8>, PlacardError> {
        let surface = paint::render_surface(&self.plan, &self.background, &self.images, fonts);
        export::rasterize(&surface, self.quality)
    }

    /// Same plan through the vector backend.
    pub fn to_svg(&self, fonts: &FontLibrary) -> String {
        svg::render_svg(&self.plan, fonts, &self.images)
    }

    pub fn snapshot(&self) -> GeometrySnapshot {
        GeometrySnapshot::capture(self.width, self.height, &self.fields)
    }
}

/// Geometry-only resolution for thin clients that paint elsewhere.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutResolution {
    pub target_width: u32,
    pub target_height: u32,
    pub fields: Vec<RenderedField>,
    pub snapshot: GeometrySnapshot,
}

/// Shared entry point for previews, exports, batches and the CLI.
///
/// Cloning shares the asset store and font library.
#[derive(Clone)]
pub struct Renderer {
    assets: AssetStore,
    fonts: Arc<FontLibrary>,
}

impl Renderer {
    pub fn new(assets: AssetStore, fonts: Arc<FontLibrary>) -> Self {
        Self { assets, fonts }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn fonts(&self) -> &Arc<FontLibrary> {
        &self.fonts
    }

    /// Await every asset the render needs and freeze its geometry.
    ///
    /// The background is fatal when unavailable. Field images are not:
    /// a missing one is logged and painted as a placeholder.
    pub async fn prepare(&self, request: &RenderRequest) -> Result<PreparedRender, PlacardError> {
        let background = self.assets.load_image(&request.template.background).await?;
        let (width, height) = target_size(request, &background)?;

        let values = ValueContext::new(&request.data, &request.variables);
        let fields = layout::normalize(&request.template.fields, &values, width, height)?;
        let plan = compose::compose(&request.template, &fields, width, height);

        let mut images = HashMap::new();
        for command in &plan.commands {
            if let PaintCommand::Image(img) = command
                && !images.contains_key(&img.source)
            {
                match self.assets.load_image(&img.source).await {
                    Ok(decoded) => {
                        images.insert(img.source.clone(), decoded);
                    }
                    Err(e) => log::warn!("image field {:?}: {}", img.name, e),
                }
            }
        }

        Ok(PreparedRender {
            background,
            images,
            fields,
            plan,
            width,
            height,
            quality: request.quality,
        })
    }

    /// Full pipeline in one call, for the CLI and tests.
    pub async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, PlacardError> {
        let prepared = self.prepare(request).await?;
        prepared.rasterize(&self.fonts)
    }

    /// Full pipeline through the vector backend.
    pub async fn render_svg(&self, request: &RenderRequest) -> Result<String, PlacardError> {
        let prepared = self.prepare(request).await?;
        Ok(prepared.to_svg(&self.fonts))
    }

    /// Geometry without painting.
    ///
    /// Only fetches the background when the height has to be derived
    /// from its aspect ratio; with an explicit height this touches no
    /// assets at all.
    pub async fn resolve_layout(&self, request: &RenderRequest) -> Result<LayoutResolution, PlacardError> {
        let (width, height) = match request.target_height {
            Some(height) if height > 0 => {
                if request.target_width == 0 {
                    return Err(PlacardError::InvalidRequest(
                        "target_width must be positive".into(),
                    ));
                }
                (request.target_width, height)
            }
            Some(_) => {
                return Err(PlacardError::InvalidRequest(
                    "target_height must be positive".into(),
                ));
            }
            None => {
                let background = self.assets.load_image(&request.template.background).await?;
                target_size(request, &background)?
            }
        };

        let values = ValueContext::new(&request.data, &request.variables);
        let fields = layout::normalize(&request.template.fields, &values, width, height)?;
        let snapshot = GeometrySnapshot::capture(width, height, &fields);

        Ok(LayoutResolution {
            target_width: width,
            target_height: height,
            fields,
            snapshot,
        })
    }
}
