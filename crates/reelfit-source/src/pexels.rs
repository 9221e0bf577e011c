//! Pexels video API client.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, Instrument};
use url::Url;

use reelfit_models::{CandidateClip, ClipId, Resolution};

use crate::config::PexelsConfig;
use crate::error::{SourceError, SourceResult};
use crate::source::ClipSource;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideo {
    id: u64,
    width: u32,
    height: u32,
    duration: f64,
    url: String,
    #[serde(default)]
    video_files: Vec<PexelsVideoFile>,
}

/// One downloadable rendition of a Pexels video.
#[derive(Debug, Clone, Deserialize)]
pub struct PexelsVideoFile {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub file_type: Option<String>,
    pub link: String,
}

/// Pick the rendition whose size is closest to `preferred`.
///
/// Distance is `|w - W| + |h - H|`; renditions without dimensions are
/// only used when nothing else is available. Ties keep the first file.
pub fn best_video_file(files: &[PexelsVideoFile], preferred: Resolution) -> Option<&PexelsVideoFile> {
    let distance = |f: &PexelsVideoFile| match (f.width, f.height) {
        (Some(w), Some(h)) => {
            (w as i64 - preferred.width as i64).unsigned_abs() + (h as i64 - preferred.height as i64).unsigned_abs()
        }
        _ => u64::MAX,
    };

    files
        .iter()
        .filter(|f| f.file_type.as_deref().map_or(true, |t| t.starts_with("video/")))
        .min_by_key(|f| distance(*f))
}

/// Pexels REST API client.
#[derive(Debug, Clone)]
pub struct PexelsClient {
    http: Client,
    config: PexelsConfig,
}

impl PexelsClient {
    /// Create a new Pexels client.
    pub fn new(config: PexelsConfig) -> SourceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("reelfit-source/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> SourceResult<Self> {
        Self::new(PexelsConfig::from_env()?)
    }

    pub fn config(&self) -> &PexelsConfig {
        &self.config
    }

    fn search_url(&self, query: &str, page: u32, page_size: u32) -> SourceResult<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/search", base))?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("per_page", &page_size.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    fn to_candidate(&self, video: PexelsVideo) -> CandidateClip {
        let download_url = best_video_file(&video.video_files, self.config.preferred_resolution)
            .map(|f| f.link.clone());

        CandidateClip {
            id: ClipId::from(video.id),
            source_uri: video.url,
            width: video.width,
            height: video.height,
            duration: video.duration,
            download_url,
        }
    }

    async fn error_for(response: reqwest::Response) -> SourceError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        SourceError::from_http_status(status, body)
    }
}

#[async_trait]
impl ClipSource for PexelsClient {
    async fn search(&self, query: &str, page: u32, page_size: u32) -> SourceResult<Vec<CandidateClip>> {
        let url = self.search_url(query, page, page_size)?;

        async {
            let response = self
                .http
                .get(url)
                .header("Authorization", &self.config.api_key)
                .send()
                .await?;

            if response.status() != StatusCode::OK {
                return Err(Self::error_for(response).await);
            }

            let body: SearchResponse = response.json().await?;
            let clips: Vec<CandidateClip> = body
                .videos
                .into_iter()
                .map(|v| self.to_candidate(v))
                .collect();

            debug!(results = clips.len(), "Pexels search returned");
            Ok(clips)
        }
        .instrument(info_span!("pexels_search", query, page))
        .await
    }

    async fn download(&self, clip: &CandidateClip, dest: &Path) -> SourceResult<()> {
        let link = clip
            .download_url
            .as_deref()
            .ok_or_else(|| SourceError::NoDownloadUrl(clip.id.to_string()))?;

        let partial = dest.with_extension("part");

        let result = async {
            let response = self.http.get(link).send().await?;
            if !response.status().is_success() {
                return Err(Self::error_for(response).await);
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).await?;
            }

            let mut file = fs::File::create(&partial).await?;
            let mut stream = response.bytes_stream();
            let mut written: u64 = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                written += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            drop(file);

            fs::rename(&partial, dest).await?;
            debug!(bytes = written, dest = %dest.display(), "Downloaded clip");
            Ok(())
        }
        .instrument(info_span!("pexels_download", clip_id = %clip.id))
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&partial).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(w: Option<u32>, h: Option<u32>, link: &str) -> PexelsVideoFile {
        PexelsVideoFile {
            width: w,
            height: h,
            file_type: Some("video/mp4".into()),
            link: link.into(),
        }
    }

    #[test]
    fn test_best_file_by_distance() {
        let files = vec![
            file(Some(3840), Some(2160), "uhd"),
            file(Some(1920), Some(1080), "fhd"),
            file(Some(1280), Some(720), "hd"),
            file(None, None, "unknown"),
        ];

        assert_eq!(best_video_file(&files, Resolution::new(1920, 1080)).unwrap().link, "fhd");
        assert_eq!(best_video_file(&files, Resolution::new(1366, 768)).unwrap().link, "hd");
        assert_eq!(best_video_file(&files, Resolution::new(4096, 2160)).unwrap().link, "uhd");
    }

    #[test]
    fn test_best_file_falls_back_to_unsized() {
        let files = vec![file(None, None, "only")];
        assert_eq!(best_video_file(&files, Resolution::new(1920, 1080)).unwrap().link, "only");
        assert!(best_video_file(&[], Resolution::new(1920, 1080)).is_none());
    }

    #[test]
    fn test_search_url() {
        let client = PexelsClient::new(PexelsConfig::new("key").with_base_url("http://localhost:1234/videos/"))
            .unwrap();
        let url = client.search_url("city lights", 2, 80).unwrap();
        assert_eq!(url.path(), "/videos/search");
        assert_eq!(url.query(), Some("query=city+lights&per_page=80&page=2"));
    }
}
