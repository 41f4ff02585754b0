//! # Error Types
//!
//! This module defines error types used throughout the placard library.

use serde::Serialize;
use thiserror::Error;

/// Main error type for placard operations
#[derive(Debug, Error)]
pub enum PlacardError {
    /// Template parsing or lookup errors
    #[error("Template error: {0}")]
    Template(String),

    /// Asset fetch or decode errors (backgrounds, field images)
    #[error("Asset error: {0}")]
    Asset(String),

    /// Font registration or lookup error
    #[error("Font error: {0}")]
    Font(String),

    /// Raster encoding error
    #[error("Encode error: {0}")]
    Encode(String),

    /// Malformed or out-of-range render parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A newer request for the same template arrived while this render
    /// was waiting on asset decode
    #[error("Render superseded by a newer request")]
    Superseded,

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline stage a render request moves through. Failures keep the
/// phase they died in so batch reports can name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    Requested,
    Resolving,
    Normalizing,
    Compositing,
    Rasterizing,
}

impl std::fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RenderPhase::Requested => "requested",
            RenderPhase::Resolving => "resolving",
            RenderPhase::Normalizing => "normalizing",
            RenderPhase::Compositing => "compositing",
            RenderPhase::Rasterizing => "rasterizing",
        };
        write!(f, "{name}")
    }
}

impl PlacardError {
    /// Which pipeline phase produced this error. `None` for errors that
    /// are not tied to a stage (e.g. a superseded preview).
    pub fn phase(&self) -> Option<RenderPhase> {
        match self {
            PlacardError::Template(_) => Some(RenderPhase::Requested),
            PlacardError::Asset(_) => Some(RenderPhase::Resolving),
            PlacardError::InvalidRequest(_) => Some(RenderPhase::Requested),
            PlacardError::Font(_) => Some(RenderPhase::Compositing),
            PlacardError::Encode(_) => Some(RenderPhase::Rasterizing),
            PlacardError::Io(_) => Some(RenderPhase::Rasterizing),
            PlacardError::Superseded => None,
        }
    }
}
