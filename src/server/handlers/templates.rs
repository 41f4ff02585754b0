//! Template store handlers.
//!
//! A minimal in-memory store so editors can save templates between
//! preview calls. Render endpoints still accept inline templates; this
//! store is a convenience, not a dependency.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use crate::template::Template;

use super::super::state::AppState;

/// Handle POST /api/templates - store (or replace) a template.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(template): Json<Template>,
) -> Result<(StatusCode, Json<Template>), (StatusCode, String)> {
    if template.id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "template id must not be empty".into()));
    }
    state
        .templates
        .write()
        .await
        .insert(template.id.clone(), template.clone());
    Ok((StatusCode::CREATED, Json(template)))
}

/// Handle GET /api/templates - all stored templates, ordered by id.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<Template>> {
    let templates = state.templates.read().await;
    let mut all: Vec<Template> = templates.values().cloned().collect();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    Json(all)
}

/// Handle GET /api/templates/:id - one stored template.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Template>, (StatusCode, String)> {
    state
        .templates
        .read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no template {:?}", id)))
}
