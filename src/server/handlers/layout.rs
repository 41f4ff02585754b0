//! Layout API handler: geometry without painting.
//!
//! Thin clients (a browser editor positioning DOM nodes) post the same
//! body as a render and get back the normalized fields plus a geometry
//! snapshot they can later submit to the parity endpoint.

use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use crate::render::{LayoutResolution, RenderRequest};

use super::super::state::AppState;
use super::render::error_response;

/// Handle POST /api/layout/resolve - normalized geometry as JSON.
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<LayoutResolution>, (StatusCode, String)> {
    state
        .renderer
        .resolve_layout(&request)
        .await
        .map(Json)
        .map_err(error_response)
}
