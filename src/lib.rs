//! # Placard - Template Card Rendering Library
//!
//! Placard renders personalized certificates, badges and cards: a fixed
//! template background with text and image fields overlaid at
//! percentage positions. Every backend consumes the same normalized
//! geometry, so an interactive preview and an independent batch export
//! agree to the pixel. It provides:
//!
//! - **Layout normalization**: canonical-width scaling, font clamping, z ordering
//! - **Value resolution**: form-data fallback chain with `{{variable}}` interpolation
//! - **Two paint backends**: RGBA raster and SVG, both fed by one paint plan
//! - **Quality tiers**: preview/medium/high raster density applied after layout
//! - **Parity verification**: serializable geometry snapshots diffed across environments
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use placard::{
//!     assets::AssetStore,
//!     compose::font::FontLibrary,
//!     render::{RenderRequest, Renderer},
//!     template::{FormData, Template},
//! };
//!
//! # async fn example() -> Result<(), placard::PlacardError> {
//! let template = Template::from_json(r#"{
//!     "id": "diploma",
//!     "background": "https://example.com/diploma.png",
//!     "fields": [
//!         {"name": "recipient", "position": {"x": 50, "y": 40},
//!          "style": {"font_size": 36, "align": "center"}}
//!     ]
//! }"#)?;
//!
//! let renderer = Renderer::new(
//!     AssetStore::over_http()?,
//!     Arc::new(FontLibrary::new()),
//! );
//! let request = RenderRequest::new(
//!     template,
//!     FormData::from([("recipient", "Ada Lovelace")]),
//!     1200,
//! );
//! let png = renderer.render(&request).await?;
//! std::fs::write("card.png", png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`template`] | Template and field data model, value resolution |
//! | [`layout`] | Geometry normalization to target pixels |
//! | [`compose`] | Paint plan and the raster/SVG backends |
//! | [`export`] | Quality tiers and PNG encoding |
//! | [`parity`] | Cross-environment geometry verification |
//! | [`assets`] | Image fetching and caching |
//! | [`render`] | Pipeline orchestration and batch jobs |
//! | [`server`] | HTTP JSON API |
//! | [`error`] | Error types |

pub mod assets;
pub mod compose;
pub mod error;
pub mod export;
pub mod layout;
pub mod parity;
pub mod render;
pub mod server;
pub mod template;

// Re-exports for convenience
pub use error::PlacardError;
pub use render::{RenderRequest, Renderer};
pub use template::Template;
