//! Pexels client configuration.

use std::time::Duration;

use reelfit_models::Resolution;

use crate::error::{SourceError, SourceResult};

/// Production Pexels video API.
pub const DEFAULT_BASE_URL: &str = "https://api.pexels.com/videos";
/// Results requested per search page (API maximum)
pub const DEFAULT_PAGE_SIZE: u32 = 80;
/// Upper bound on pages fetched for one query
pub const DEFAULT_MAX_PAGES: u32 = 5;

/// Pexels client configuration.
#[derive(Debug, Clone)]
pub struct PexelsConfig {
    /// API key sent in the `Authorization` header
    pub api_key: String,
    /// API root, overridable for tests and proxies
    pub base_url: String,
    pub page_size: u32,
    pub max_pages: u32,
    /// Rendition closest to this size is chosen for download
    pub preferred_resolution: Resolution,
    /// Request timeout (searches and whole downloads)
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl PexelsConfig {
    /// Config with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            preferred_resolution: Resolution::new(1920, 1080),
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> SourceResult<Self> {
        let api_key = std::env::var("PEXELS_API_KEY")
            .map_err(|_| SourceError::config("PEXELS_API_KEY must be set to search for clips"))?;

        if api_key.trim().is_empty() {
            return Err(SourceError::config("PEXELS_API_KEY cannot be empty"));
        }

        let mut config = Self::new(api_key);

        if let Ok(url) = std::env::var("PEXELS_BASE_URL") {
            config.base_url = url;
        }
        config.page_size = std::env::var("PEXELS_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, DEFAULT_PAGE_SIZE);
        config.max_pages = std::env::var("PEXELS_MAX_PAGES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_PAGES)
            .max(1);
        if let Some(res) = std::env::var("PEXELS_PREFERRED_RESOLUTION")
            .ok()
            .and_then(|s| parse_resolution(&s))
        {
            config.preferred_resolution = res;
        }
        if let Some(secs) = std::env::var("PEXELS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Parse "1920x1080".
pub fn parse_resolution(s: &str) -> Option<Resolution> {
    let (w, h) = s.trim().split_once(['x', 'X'])?;
    Some(Resolution::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080"), Some(Resolution::new(1920, 1080)));
        assert_eq!(parse_resolution(" 720X1280 "), Some(Resolution::new(720, 1280)));
        assert_eq!(parse_resolution("hd"), None);
    }

    #[test]
    fn test_defaults() {
        let config = PexelsConfig::new("key").with_base_url("http://localhost:9999");
        assert_eq!(config.page_size, 80);
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.base_url, "http://localhost:9999");
    }
}
