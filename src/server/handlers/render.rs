//! Render API handlers: preview, export, batch.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::PlacardError;
use crate::export::QualityTier;
use crate::render::batch::{self, BatchJob, BatchReport};
use crate::render::RenderRequest;

use super::super::state::{AppState, CachedPreview};

/// Map library errors onto HTTP statuses. Superseded renders are a
/// conflict, not a failure: the client already sent a newer request.
pub(crate) fn error_status(e: &PlacardError) -> StatusCode {
    match e {
        PlacardError::Template(_) | PlacardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PlacardError::Superseded => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(e: PlacardError) -> (StatusCode, String) {
    (error_status(&e), e.to_string())
}

fn png_response(bytes: Vec<u8>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], bytes)
}

/// Handle POST /api/render/preview - interactive preview PNG.
///
/// Pins the preview tier, memoizes on the canonical request key, and
/// discards the render when a newer request for the same template
/// arrives while assets are in flight.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<RenderRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    request.quality = QualityTier::Preview;
    let key = request.canonical_key().map_err(error_response)?;

    {
        let mut cache = state.preview_cache.write().await;
        if let Some(entry) = cache.get_mut(&key) {
            entry.touch();
            return Ok(png_response(entry.bytes.clone()));
        }
    }

    let generation = state.guard.begin(&request.template.id).await;
    let prepared = state
        .renderer
        .prepare(&request)
        .await
        .map_err(error_response)?;
    state
        .guard
        .ensure_current(&request.template.id, generation)
        .await
        .map_err(error_response)?;

    let fonts = state.renderer.fonts().clone();
    let bytes = tokio::task::spawn_blocking(move || prepared.rasterize(&fonts))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task error: {}", e)))?
        .map_err(error_response)?;

    {
        let mut cache = state.preview_cache.write().await;
        cache.insert(key, CachedPreview::new(bytes.clone()));
    }

    Ok(png_response(bytes))
}

/// Handle POST /api/render/export - final PNG at the requested tier.
pub async fn export(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RenderRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let prepared = state
        .renderer
        .prepare(&request)
        .await
        .map_err(error_response)?;

    let fonts = state.renderer.fonts().clone();
    let bytes = tokio::task::spawn_blocking(move || prepared.rasterize(&fonts))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task error: {}", e)))?
        .map_err(error_response)?;

    Ok(png_response(bytes))
}

/// Batch request body: a job plus an optional server-side output
/// directory. Without one the job validates and reports only.
#[derive(Debug, Deserialize)]
pub struct BatchParams {
    #[serde(flatten)]
    pub job: BatchJob,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

/// Handle POST /api/render/batch - run a batch job, return the report.
pub async fn run_batch(
    State(state): State<Arc<AppState>>,
    Json(params): Json<BatchParams>,
) -> Result<Json<BatchReport>, (StatusCode, String)> {
    let report = batch::run(&state.renderer, &params.job, params.out_dir.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}
