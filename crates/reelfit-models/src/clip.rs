//! Candidate clip metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-assigned identifier of a clip.
///
/// Two candidates with the same id are the same footage, regardless of
/// which search page or rendition they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    /// Create from an existing string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClipId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ClipId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A clip offered by a clip source, before anything has been downloaded.
///
/// Produced by the source provider and never modified by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateClip {
    /// Source id (deduplication key)
    pub id: ClipId,

    /// Where the clip lives: a provider page URL or a local file path
    pub source_uri: String,

    /// Width in pixels as reported by the provider
    pub width: u32,

    /// Height in pixels as reported by the provider
    pub height: u32,

    /// Duration in seconds as reported by the provider
    pub duration: f64,

    /// Direct media URL; `None` when `source_uri` is already a local file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl CandidateClip {
    /// Create a candidate that refers to a file already on disk.
    pub fn local(
        id: impl Into<ClipId>,
        path: impl Into<String>,
        width: u32,
        height: u32,
        duration: f64,
    ) -> Self {
        Self {
            id: id.into(),
            source_uri: path.into(),
            width,
            height,
            duration,
            download_url: None,
        }
    }

    /// Width divided by height, or `None` when either dimension is unknown.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(self.width as f64 / self.height as f64)
    }

    /// Whether the clip must be downloaded before it can be processed.
    pub fn needs_download(&self) -> bool {
        self.download_url.is_some()
    }
}

impl From<String> for ClipId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio() {
        let clip = CandidateClip::local("1", "/tmp/a.mp4", 1920, 1080, 12.0);
        assert!((clip.aspect_ratio().unwrap() - 1.777).abs() < 0.01);

        let unknown = CandidateClip::local("2", "/tmp/b.mp4", 0, 1080, 12.0);
        assert!(unknown.aspect_ratio().is_none());
    }

    #[test]
    fn test_clip_id_serializes_transparently() {
        let clip = CandidateClip {
            id: ClipId::from(42u64),
            source_uri: "https://example.com/video/42".into(),
            width: 1280,
            height: 720,
            duration: 8.0,
            download_url: Some("https://cdn.example.com/42.mp4".into()),
        };

        let json = serde_json::to_value(&clip).unwrap();
        assert_eq!(json["id"], "42");
        assert!(clip.needs_download());
    }
}
