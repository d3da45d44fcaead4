//! Asset fetching: turns an image reference into bytes.
//!
//! References are either `data:` URLs (decoded locally, never fetched) or
//! URLs handed to an [`AssetFetcher`]. The HTTP fetcher can route requests
//! through a proxy prefix so that cross-origin assets come back readable;
//! the prefix is configuration, never hardcoded.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::path::Path;

use crate::error::SouvyError;

/// Fetch raw asset bytes for a URL.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SouvyError>;
}

/// Is this reference an inline `data:` URL?
pub fn is_data_url(reference: &str) -> bool {
    reference.starts_with("data:")
}

/// Decode a base64 `data:` URL into bytes.
pub fn decode_data_url(reference: &str) -> Result<Vec<u8>, SouvyError> {
    let rest = reference
        .strip_prefix("data:")
        .ok_or_else(|| SouvyError::Image("not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| SouvyError::Image("malformed data URL".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(SouvyError::Image(
            "only base64 data URLs are supported".to_string(),
        ));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| SouvyError::Image(format!("Invalid base64 in data URL: {}", e)))
}

/// Load bytes for any reference: inline data URLs directly, everything else through `fetcher`.
pub async fn load_bytes(reference: &str, fetcher: &dyn AssetFetcher) -> Result<Vec<u8>, SouvyError> {
    if is_data_url(reference) {
        decode_data_url(reference)
    } else {
        fetcher.fetch(reference).await
    }
}

/// Fetches over HTTP(S), optionally through a proxy prefix.
pub struct HttpFetcher {
    client: reqwest::Client,
    /// Prefix the target URL is appended to (percent-encoded), e.g. `https://proxy.example/?`.
    proxy: Option<String>,
    /// Also accept plain filesystem paths and `file://` URLs (CLI use only).
    allow_local_files: bool,
}

impl HttpFetcher {
    pub fn new(proxy: Option<String>) -> Result<Self, SouvyError> {
        let client = reqwest::Client::builder()
            .user_agent("souvy/0.1")
            .build()
            .map_err(|e| SouvyError::Fetch(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            proxy: proxy.filter(|p| !p.is_empty()),
            allow_local_files: false,
        })
    }

    pub fn with_local_files(mut self, allow: bool) -> Self {
        self.allow_local_files = allow;
        self
    }

    /// The URL actually requested for `url`.
    pub fn request_url(&self, url: &str) -> String {
        match &self.proxy {
            Some(prefix) => format!("{}{}", prefix, urlencoding::encode(url)),
            None => url.to_string(),
        }
    }

    fn local_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        if !self.allow_local_files {
            return None;
        }
        if let Some(path) = url.strip_prefix("file://") {
            return Some(path);
        }
        (!url.starts_with("http://") && !url.starts_with("https://")).then_some(url)
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SouvyError> {
        if let Some(path) = self.local_path(url) {
            return tokio::fs::read(Path::new(path))
                .await
                .map_err(|e| SouvyError::Fetch(format!("Failed to read {}: {}", path, e)));
        }

        let response = self
            .client
            .get(self.request_url(url))
            .send()
            .await
            .map_err(|e| SouvyError::Fetch(format!("Failed to download {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(SouvyError::Fetch(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SouvyError::Fetch(format!("Failed to read asset data: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Serves assets from memory. Unknown URLs fail like a network error.
///
/// Useful for hosts that already hold the bytes, and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    assets: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.assets.insert(url.to_string(), bytes);
        self
    }
}

#[async_trait]
impl AssetFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SouvyError> {
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| SouvyError::Fetch(format!("Failed to download {}: not found", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url() {
        let bytes = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        assert!(decode_data_url("https://x/y.png").is_err());
    }

    #[test]
    fn test_proxy_prefix_encodes_target() {
        let fetcher = HttpFetcher::new(Some("https://proxy.test/?".to_string())).unwrap();
        assert_eq!(
            fetcher.request_url("https://shop.test/a b.jpg?x=1"),
            "https://proxy.test/?https%3A%2F%2Fshop.test%2Fa%20b.jpg%3Fx%3D1"
        );
        let direct = HttpFetcher::new(Some(String::new())).unwrap();
        assert_eq!(direct.request_url("https://shop.test/a.jpg"), "https://shop.test/a.jpg");
    }

    #[test]
    fn test_local_paths_only_when_allowed() {
        let fetcher = HttpFetcher::new(None).unwrap();
        assert_eq!(fetcher.local_path("/tmp/a.png"), None);
        let fetcher = fetcher.with_local_files(true);
        assert_eq!(fetcher.local_path("/tmp/a.png"), Some("/tmp/a.png"));
        assert_eq!(fetcher.local_path("file:///tmp/a.png"), Some("/tmp/a.png"));
        assert_eq!(fetcher.local_path("https://x/a.png"), None);
    }

    #[tokio::test]
    async fn test_load_bytes_prefers_inline_data() {
        let fetcher = StaticFetcher::new().with("https://x/a.png", vec![1, 2, 3]);
        assert_eq!(load_bytes("https://x/a.png", &fetcher).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(load_bytes("data:image/png;base64,AQI=", &fetcher).await.unwrap(), vec![1, 2]);
        assert!(matches!(
            load_bytes("https://x/missing.png", &fetcher).await,
            Err(SouvyError::Fetch(_))
        ));
    }
}
