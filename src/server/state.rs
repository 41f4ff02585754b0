//! Server state and configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::assets::GenerationGuard;
use crate::render::Renderer;
use crate::template::Template;

/// Idle time after which cached previews and decoded assets expire.
pub const CACHE_EXPIRATION_SECS: u64 = 600;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Directory scanned for TTF/OTF files at startup.
    pub fonts_dir: Option<PathBuf>,
}

/// A memoized preview render.
pub struct CachedPreview {
    pub bytes: Vec<u8>,
    pub last_accessed: Instant,
}

impl CachedPreview {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            last_accessed: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub renderer: Renderer,
    /// Stale-request detection for interactive previews.
    pub guard: GenerationGuard,
    /// Preview memo cache keyed by canonical request JSON, so any field,
    /// style or data change misses structurally.
    pub preview_cache: RwLock<HashMap<String, CachedPreview>>,
    /// Template store: id → template.
    pub templates: RwLock<HashMap<String, Template>>,
}

impl AppState {
    pub fn new(config: ServerConfig, renderer: Renderer) -> Self {
        Self {
            config,
            renderer,
            guard: GenerationGuard::new(),
            preview_cache: RwLock::new(HashMap::new()),
            templates: RwLock::new(HashMap::new()),
        }
    }
}
