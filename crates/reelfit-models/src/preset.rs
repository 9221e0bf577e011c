//! Output encoding presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::criteria::AspectPreference;
use crate::error::{ModelError, ModelResult};

/// Preset used when a job names an unknown preset
pub const DEFAULT_PRESET_NAME: &str = "presentation";
/// Default video codec family
pub const DEFAULT_CODEC: &str = "h264";
/// Pixel format for normalized output
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Orient the frame for the requested footage orientation.
    ///
    /// Vertical output is always portrait; other preferences keep the
    /// preset's own orientation.
    pub fn oriented_for(self, aspect: AspectPreference) -> Self {
        match aspect {
            AspectPreference::Vertical if self.width > self.height => Self {
                width: self.height,
                height: self.width,
            },
            _ => self,
        }
    }

    /// Both dimensions are non-zero and even (required by 4:2:0 encoders).
    pub fn is_encodable(&self) -> bool {
        self.width > 0 && self.height > 0 && self.width % 2 == 0 && self.height % 2 == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Named bundle of output encoding parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PresetProfile {
    pub name: String,
    pub resolution: Resolution,
    pub fps: u32,
    /// Video bitrate in kbit/s
    pub bitrate_kbps: u32,
    /// Codec family ("h264", "h265")
    #[serde(default = "default_codec")]
    pub codec: String,
    /// Audio bitrate in kbit/s
    pub audio_bitrate_kbps: u32,
}

fn default_codec() -> String {
    DEFAULT_CODEC.to_string()
}

impl PresetProfile {
    pub fn new(
        name: impl Into<String>,
        resolution: Resolution,
        fps: u32,
        bitrate_kbps: u32,
        audio_bitrate_kbps: u32,
    ) -> Self {
        Self {
            name: name.into(),
            resolution,
            fps,
            bitrate_kbps,
            codec: DEFAULT_CODEC.to_string(),
            audio_bitrate_kbps,
        }
    }

    /// FFmpeg encoder for the codec family.
    pub fn encoder(&self) -> &str {
        match self.codec.as_str() {
            "h264" | "avc" => "libx264",
            "h265" | "hevc" => "libx265",
            other => other,
        }
    }

    /// Video bitrate as an FFmpeg argument value (e.g. "8000k").
    pub fn video_bitrate_arg(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }

    /// Copy of this profile with its frame oriented for `aspect`.
    pub fn oriented_for(&self, aspect: AspectPreference) -> Self {
        Self {
            resolution: self.resolution.oriented_for(aspect),
            ..self.clone()
        }
    }

    /// Video encoding arguments shared by normalization and re-encoding.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-r".to_string(),
            self.fps.to_string(),
            "-c:v".to_string(),
            self.encoder().to_string(),
            "-b:v".to_string(),
            self.video_bitrate_arg(),
            "-pix_fmt".to_string(),
            DEFAULT_PIXEL_FORMAT.to_string(),
        ]
    }

    /// Validate the profile.
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::invalid_preset(&self.name, "name must not be empty"));
        }
        if !self.resolution.is_encodable() {
            return Err(ModelError::invalid_preset(
                &self.name,
                format!("resolution {} must have even, non-zero dimensions", self.resolution),
            ));
        }
        if self.fps == 0 {
            return Err(ModelError::invalid_preset(&self.name, "fps must be positive"));
        }
        if self.bitrate_kbps == 0 {
            return Err(ModelError::invalid_preset(&self.name, "bitrate must be positive"));
        }
        Ok(())
    }
}

/// Lookup table of presets by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetCatalog {
    presets: BTreeMap<String, PresetProfile>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetCatalog {
    /// Catalog with the four built-in presets.
    pub fn builtin() -> Self {
        let builtins = [
            PresetProfile::new("social_media", Resolution::new(1080, 1920), 30, 8000, 128),
            PresetProfile::new("presentation", Resolution::new(1920, 1080), 30, 10000, 192),
            PresetProfile::new("mobile", Resolution::new(720, 1280), 30, 4000, 96),
            PresetProfile::new("high_quality", Resolution::new(1920, 1080), 60, 20000, 320),
        ];

        Self {
            presets: builtins
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    /// Add or replace a preset after validating it.
    pub fn register(&mut self, profile: PresetProfile) -> ModelResult<()> {
        profile.validate()?;
        self.presets.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Exact lookup.
    pub fn get(&self, name: &str) -> Option<&PresetProfile> {
        self.presets.get(name)
    }

    /// Lookup that falls back to the default preset for unknown names.
    pub fn resolve(&self, name: &str) -> PresetProfile {
        self.presets
            .get(name)
            .or_else(|| self.presets.get(DEFAULT_PRESET_NAME))
            .cloned()
            .unwrap_or_else(|| {
                PresetProfile::new(DEFAULT_PRESET_NAME, Resolution::new(1920, 1080), 30, 10000, 192)
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}
