//! # HTTP Server for Template Rendering
//!
//! JSON API over the render pipeline: interactive previews, final
//! exports, batch jobs, geometry resolution and parity verification.
//!
//! ## Usage
//!
//! ```bash
//! placard serve --listen 0.0.0.0:8080 --fonts-dir ./fonts
//! ```

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::assets::AssetStore;
use crate::compose::font::FontLibrary;
use crate::error::PlacardError;
use crate::render::Renderer;
use state::CACHE_EXPIRATION_SECS;

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use placard::server::{serve, ServerConfig};
///
/// # async fn example() -> Result<(), placard::error::PlacardError> {
/// let config = ServerConfig {
///     listen_addr: "0.0.0.0:8080".to_string(),
///     fonts_dir: None,
/// };
///
/// serve(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<(), PlacardError> {
    let mut fonts = FontLibrary::new();
    if let Some(dir) = &config.fonts_dir {
        let count = fonts.load_dir(dir)?;
        log::info!("loaded {} font families from {}", count, dir.display());
    }
    let renderer = Renderer::new(AssetStore::over_http()?, Arc::new(fonts));
    let app_state = Arc::new(AppState::new(config.clone(), renderer));

    // Spawn background cache cleanup task
    tokio::spawn(cleanup_caches(app_state.clone()));

    let app = Router::new()
        // Render API (10MB limit for inline image data rows)
        .route("/api/render/preview", post(handlers::render::preview))
        .route("/api/render/export", post(handlers::render::export))
        .route(
            "/api/render/batch",
            post(handlers::render::run_batch).layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
        // Layout / parity API
        .route("/api/layout/resolve", post(handlers::layout::resolve))
        .route("/api/parity/verify", post(handlers::parity::verify))
        // Template store
        .route(
            "/api/templates",
            post(handlers::templates::create).get(handlers::templates::list),
        )
        .route("/api/templates/:id", get(handlers::templates::show))
        .with_state(app_state);

    log::info!("placard server listening on {}", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Background task to clean up expired cache entries.
async fn cleanup_caches(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    let expiration = Duration::from_secs(CACHE_EXPIRATION_SECS);

    loop {
        interval.tick().await;

        let evicted = state.renderer.assets().evict_idle(expiration).await;
        if evicted > 0 {
            log::info!("evicted {} idle decoded assets", evicted);
        }

        {
            let mut cache = state.preview_cache.write().await;
            let before = cache.len();
            let now = Instant::now();
            cache.retain(|_, v| now.duration_since(v.last_accessed) < expiration);
            let after = cache.len();
            if before != after {
                log::info!(
                    "evicted {} idle preview renders ({} remaining)",
                    before - after,
                    after
                );
            }
        }
    }
}
