//! Asset fetching and caching: background and field images.
//!
//! `AssetStore` handles all image fetching concerns so the render
//! pipeline stays a pure computation with no HTTP or caching knowledge.
//! Fetching goes through the `AssetFetcher` trait; the HTTP
//! implementation serves production and the in-memory one serves tests
//! and batch fixtures. Decoded images live in a shared cache with
//! last-access timestamps so the server's cleanup task can evict idle
//! entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::DynamicImage;
use tokio::sync::RwLock;

use crate::error::PlacardError;

/// Fetches raw asset bytes by reference.
///
/// A reference is a URL or a local path, whatever the deployment hands
/// out. Implementations only produce bytes; decoding and caching stay
/// in `AssetStore`.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, PlacardError>;
}

/// Production fetcher: HTTP(S) references are downloaded, anything else
/// is read from the local filesystem.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, PlacardError> {
        let client = reqwest::Client::builder()
            .user_agent("placard/0.2")
            .build()
            .map_err(|e| PlacardError::Asset(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, PlacardError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let response = self.client.get(reference).send().await.map_err(|e| {
                PlacardError::Asset(format!("Failed to download {}: {}", reference, e))
            })?;
            if !response.status().is_success() {
                return Err(PlacardError::Asset(format!(
                    "Failed to download {}: HTTP {}",
                    reference,
                    response.status()
                )));
            }
            let bytes = response.bytes().await.map_err(|e| {
                PlacardError::Asset(format!("Failed to read image data: {}", e))
            })?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(reference)
                .await
                .map_err(|e| PlacardError::Asset(format!("Failed to read {}: {}", reference, e)))
        }
    }
}

/// Fixed set of in-memory assets, for tests and offline batch fixtures.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(reference.into(), bytes);
    }

    /// Builder-style insert for fixture setup.
    pub fn with(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(reference, bytes);
        self
    }
}

#[async_trait]
impl AssetFetcher for MemoryFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, PlacardError> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| PlacardError::Asset(format!("No such asset: {}", reference)))
    }
}

/// A decoded image plus the last time anything asked for it. Pixels sit
/// behind `Arc`, so the cache entry and every in-flight render using it
/// share one buffer.
pub struct CachedAsset {
    pub image: Arc<DynamicImage>,
    pub last_accessed: Instant,
}

impl CachedAsset {
    pub fn new(image: Arc<DynamicImage>) -> Self {
        Self {
            image,
            last_accessed: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Shared fetch-and-decode front end over an `AssetFetcher`.
///
/// Cloning is cheap; clones share the fetcher and the decoded-image
/// cache.
#[derive(Clone)]
pub struct AssetStore {
    fetcher: Arc<dyn AssetFetcher>,
    cache: Arc<RwLock<HashMap<String, CachedAsset>>>,
}

impl AssetStore {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            fetcher,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store backed by the production HTTP fetcher.
    pub fn over_http() -> Result<Self, PlacardError> {
        Ok(Self::new(Arc::new(HttpFetcher::new()?)))
    }

    /// Fetch and decode an image, using the cache when possible.
    ///
    /// The returned handle shares pixels with the cache entry: a batch
    /// whose rows reuse one background holds one decoded copy, not one
    /// per row.
    pub async fn load_image(&self, reference: &str) -> Result<Arc<DynamicImage>, PlacardError> {
        // Check cache
        {
            let mut cache = self.cache.write().await;
            if let Some(entry) = cache.get_mut(reference) {
                entry.touch();
                return Ok(entry.image.clone());
            }
        }

        let bytes = self.fetcher.fetch(reference).await?;
        let image = Arc::new(image::load_from_memory(&bytes).map_err(|e| {
            PlacardError::Asset(format!("Failed to decode {}: {}", reference, e))
        })?);

        // Store in cache
        {
            let mut cache = self.cache.write().await;
            cache.insert(reference.to_string(), CachedAsset::new(image.clone()));
        }

        Ok(image)
    }

    /// Drop entries idle longer than `max_idle`. Returns the eviction
    /// count so the cleanup task can log only when something happened.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        let now = Instant::now();
        cache.retain(|_, v| now.duration_since(v.last_accessed) < max_idle);
        before - cache.len()
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}

/// Monotonic per-key generation counters for stale-request detection.
///
/// A preview handler calls `begin` before awaiting asset decode and
/// checks the token afterwards. If a newer request for the same key
/// began in between, the older render is discarded instead of racing
/// the newer one.
#[derive(Default)]
pub struct GenerationGuard {
    generations: RwLock<HashMap<String, u64>>,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation for `key`, superseding all earlier ones.
    pub async fn begin(&self, key: &str) -> u64 {
        let mut map = self.generations.write().await;
        let entry = map.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub async fn is_current(&self, key: &str, generation: u64) -> bool {
        let map = self.generations.read().await;
        map.get(key).copied() == Some(generation)
    }

    /// Error with `Superseded` when a newer generation exists for `key`.
    pub async fn ensure_current(&self, key: &str, generation: u64) -> Result<(), PlacardError> {
        if self.is_current(key, generation).await {
            Ok(())
        } else {
            Err(PlacardError::Superseded)
        }
    }
}
