//! Render context: shared resources available to exports.
//!
//! Holds the asset fetcher, a cache of decoded remote images and the font
//! registry. Constructed once per server (or per CLI run) and shared by
//! every export, so a product photo is downloaded once no matter how many
//! previews are rendered against it.

use image::DynamicImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::fetch::{self, AssetFetcher, StaticFetcher};
use super::text::FontRegistry;
use crate::error::SouvyError;

/// A decoded image kept for reuse.
#[derive(Clone)]
pub struct CachedImage {
    pub image: DynamicImage,
    pub last_accessed: Instant,
}

impl CachedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            last_accessed: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Shared resources for rasterization.
#[derive(Clone)]
pub struct RenderContext {
    /// Asset fetch capability (HTTP, proxy, in-memory).
    pub fetcher: Arc<dyn AssetFetcher>,
    /// Decoded remote images keyed by URL. Inline data URLs are not cached.
    pub image_cache: Arc<RwLock<HashMap<String, CachedImage>>>,
    /// Fonts available to text elements.
    pub fonts: Arc<FontRegistry>,
}

impl RenderContext {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, fonts: FontRegistry) -> Self {
        Self {
            fetcher,
            image_cache: Arc::new(RwLock::new(HashMap::new())),
            fonts: Arc::new(fonts),
        }
    }

    /// Context with no remote assets and only the built-in bitmap font.
    pub fn empty() -> Self {
        Self::new(Arc::new(StaticFetcher::new()), FontRegistry::new())
    }

    /// Resolve an image reference to a decoded image.
    ///
    /// Data URLs are decoded in place. Other references go through the cache,
    /// then the fetcher.
    pub async fn load_image(&self, reference: &str) -> Result<DynamicImage, SouvyError> {
        if reference.is_empty() {
            return Err(SouvyError::Image("empty image reference".to_string()));
        }
        if fetch::is_data_url(reference) {
            return decode(fetch::decode_data_url(reference)?).await;
        }

        {
            let mut cache = self.image_cache.write().await;
            if let Some(entry) = cache.get_mut(reference) {
                entry.touch();
                return Ok(entry.image.clone());
            }
        }

        let bytes = self.fetcher.fetch(reference).await?;
        let image = decode(bytes).await?;

        {
            let mut cache = self.image_cache.write().await;
            cache.insert(reference.to_string(), CachedImage::new(image.clone()));
        }

        Ok(image)
    }

    /// Drop cache entries unused for longer than `expiration`. Returns how many were removed.
    pub async fn evict_stale(&self, expiration: Duration) -> usize {
        let now = Instant::now();
        let mut cache = self.image_cache.write().await;
        let before = cache.len();
        cache.retain(|_, v| now.duration_since(v.last_accessed) < expiration);
        before - cache.len()
    }
}

async fn decode(bytes: Vec<u8>) -> Result<DynamicImage, SouvyError> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| SouvyError::Image(format!("Decode task failed: {}", e)))?
        .map_err(|e| SouvyError::Image(format!("Failed to decode image: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::encode_png;
    use image::{Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))).unwrap()
    }

    #[tokio::test]
    async fn test_remote_images_are_cached() {
        let fetcher = StaticFetcher::new().with("https://shop.test/kettle.png", png(4, 3));
        let ctx = RenderContext::new(Arc::new(fetcher), FontRegistry::new());

        let img = ctx.load_image("https://shop.test/kettle.png").await.unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
        assert_eq!(ctx.image_cache.read().await.len(), 1);

        ctx.load_image("https://shop.test/kettle.png").await.unwrap();
        assert_eq!(ctx.image_cache.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_data_urls_bypass_cache() {
        use base64::Engine;
        let url = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png(2, 2))
        );
        let ctx = RenderContext::empty();
        let img = ctx.load_image(&url).await.unwrap();
        assert_eq!(img.width(), 2);
        assert!(ctx.image_cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_errors() {
        let fetcher = StaticFetcher::new().with("https://shop.test/broken.png", b"not an image".to_vec());
        let ctx = RenderContext::new(Arc::new(fetcher), FontRegistry::new());
        assert!(matches!(ctx.load_image("").await, Err(SouvyError::Image(_))));
        assert!(matches!(ctx.load_image("https://shop.test/nope.png").await, Err(SouvyError::Fetch(_))));
        assert!(matches!(ctx.load_image("https://shop.test/broken.png").await, Err(SouvyError::Image(_))));
    }

    #[tokio::test]
    async fn test_evict_stale() {
        let fetcher = StaticFetcher::new().with("https://shop.test/a.png", png(1, 1));
        let ctx = RenderContext::new(Arc::new(fetcher), FontRegistry::new());
        ctx.load_image("https://shop.test/a.png").await.unwrap();
        assert_eq!(ctx.evict_stale(Duration::from_secs(3600)).await, 0);
        assert_eq!(ctx.evict_stale(Duration::ZERO).await, 1);
    }
}
