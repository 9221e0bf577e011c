//! In-process fake of the transcoding engine.
//!
//! Media files are small JSON descriptors holding a [`VideoInfo`]; every
//! engine call reads its inputs' descriptors and writes an output
//! descriptor with the properties FFmpeg would have produced. Failures and
//! delays can be injected per operation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::fs;

use reelfit_models::{PresetProfile, Resolution};

use crate::concat::parse_manifest_line;
use crate::engine::TranscodeEngine;
use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;

#[derive(Debug, Default)]
struct State {
    fail_concat_copy: AtomicBool,
    fail_concat_reencode: AtomicBool,
    fail_trim: AtomicBool,
    timeout_trim_partial: AtomicBool,
    timeout_normalize: AtomicBool,
    fail_normalize_matching: Mutex<Vec<String>>,
    delay: Mutex<Duration>,

    normalize_calls: AtomicUsize,
    concat_calls: AtomicUsize,
    reencode_calls: AtomicUsize,
    trim_calls: AtomicUsize,
    normalized: Mutex<Vec<Resolution>>,
}

/// Cloneable fake engine; clones share counters and failure switches.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<State>,
}

fn injected(message: &str) -> MediaError {
    MediaError::ffmpeg_failed(message, Some(format!("fake engine: {message}")), Some(1))
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the stream-copy concat exit non-zero.
    pub fn fail_concat_copy(self) -> Self {
        self.state.fail_concat_copy.store(true, Ordering::SeqCst);
        self
    }

    /// Make the re-encode concat exit non-zero.
    pub fn fail_concat_reencode(self) -> Self {
        self.state.fail_concat_reencode.store(true, Ordering::SeqCst);
        self
    }

    /// Make trimming exit non-zero.
    pub fn fail_trim(self) -> Self {
        self.state.fail_trim.store(true, Ordering::SeqCst);
        self
    }

    /// Make trimming write a truncated output, then time out.
    pub fn timeout_trim_with_partial_output(self) -> Self {
        self.state.timeout_trim_partial.store(true, Ordering::SeqCst);
        self
    }

    /// Make every normalization time out.
    pub fn timeout_normalize(self) -> Self {
        self.state.timeout_normalize.store(true, Ordering::SeqCst);
        self
    }

    /// Fail normalization of inputs whose path contains `needle`.
    pub fn fail_normalize_matching(self, needle: impl Into<String>) -> Self {
        if let Ok(mut needles) = self.state.fail_normalize_matching.lock() {
            needles.push(needle.into());
        }
        self
    }

    /// Sleep this long inside every transcoding call.
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut d) = self.state.delay.lock() {
            *d = delay;
        }
        self
    }

    pub fn normalize_calls(&self) -> usize {
        self.state.normalize_calls.load(Ordering::SeqCst)
    }

    pub fn concat_calls(&self) -> usize {
        self.state.concat_calls.load(Ordering::SeqCst)
    }

    pub fn reencode_calls(&self) -> usize {
        self.state.reencode_calls.load(Ordering::SeqCst)
    }

    pub fn trim_calls(&self) -> usize {
        self.state.trim_calls.load(Ordering::SeqCst)
    }

    /// Output resolutions of successful normalizations, in completion order.
    pub fn normalized_resolutions(&self) -> Vec<Resolution> {
        self.state.normalized.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Write a descriptor file standing in for a clip.
    pub async fn write_clip(&self, path: impl AsRef<Path>, duration: f64, width: u32, height: u32) -> PathBuf {
        let path = path.as_ref().to_path_buf();
        let info = VideoInfo {
            duration,
            width,
            height,
            fps: 30.0,
            codec: "h264".to_string(),
            size: 0,
            bitrate: 5_000_000,
        };
        if let Err(e) = write_descriptor(&path, &info).await {
            panic!("failed to write fake clip {}: {e}", path.display());
        }
        path
    }

    async fn pause(&self) {
        let delay = self.state.delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn should_fail_normalize(&self, input: &Path) -> bool {
        let input = input.to_string_lossy();
        self.state
            .fail_normalize_matching
            .lock()
            .map(|needles| needles.iter().any(|n| input.contains(n.as_str())))
            .unwrap_or(false)
    }
}

async fn read_descriptor(path: &Path) -> MediaResult<VideoInfo> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| MediaError::FfprobeFailed {
        message: format!("unreadable descriptor {}", path.display()),
        stderr: Some(e.to_string()),
    })
}

async fn write_descriptor(path: &Path, info: &VideoInfo) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, serde_json::to_vec(info)?).await?;
    Ok(())
}

fn joined_info(parts: &[VideoInfo], profile: Option<&PresetProfile>) -> VideoInfo {
    let first = parts.first().cloned().unwrap_or(VideoInfo {
        duration: 0.0,
        width: 0,
        height: 0,
        fps: 30.0,
        codec: "h264".to_string(),
        size: 0,
        bitrate: 0,
    });
    let duration = parts.iter().map(|p| p.duration).sum();
    match profile {
        Some(p) => VideoInfo {
            duration,
            width: p.resolution.width,
            height: p.resolution.height,
            fps: p.fps as f64,
            bitrate: p.bitrate_kbps as u64 * 1000,
            ..first
        },
        None => VideoInfo { duration, ..first },
    }
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        read_descriptor(path).await
    }

    async fn normalize(&self, input: &Path, output: &Path, profile: &PresetProfile) -> MediaResult<()> {
        self.state.normalize_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.state.timeout_normalize.load(Ordering::SeqCst) {
            return Err(MediaError::Timeout(0));
        }
        if self.should_fail_normalize(input) {
            return Err(injected("normalize failed"));
        }

        let source = read_descriptor(input).await?;
        let info = joined_info(&[source], Some(profile));
        write_descriptor(output, &info).await?;

        if let Ok(mut normalized) = self.state.normalized.lock() {
            normalized.push(profile.resolution);
        }
        Ok(())
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> MediaResult<()> {
        self.state.concat_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.state.fail_concat_copy.load(Ordering::SeqCst) {
            return Err(injected("concat copy failed"));
        }

        let listing = fs::read_to_string(manifest).await?;
        let mut parts = Vec::new();
        for path in listing.lines().filter_map(parse_manifest_line) {
            parts.push(read_descriptor(&path).await?);
        }
        write_descriptor(output, &joined_info(&parts, None)).await
    }

    async fn concat_reencode(&self, inputs: &[PathBuf], output: &Path, profile: &PresetProfile) -> MediaResult<()> {
        self.state.reencode_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.state.fail_concat_reencode.load(Ordering::SeqCst) {
            return Err(injected("concat re-encode failed"));
        }

        let mut parts = Vec::with_capacity(inputs.len());
        for path in inputs {
            parts.push(read_descriptor(path).await?);
        }
        write_descriptor(output, &joined_info(&parts, Some(profile))).await
    }

    async fn trim(&self, input: &Path, duration: f64, output: &Path) -> MediaResult<()> {
        self.state.trim_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.state.fail_trim.load(Ordering::SeqCst) {
            return Err(injected("trim failed"));
        }
        if self.state.timeout_trim_partial.load(Ordering::SeqCst) {
            fs::write(output, b"partial").await?;
            return Err(MediaError::Timeout(300));
        }

        let mut info = read_descriptor(input).await?;
        info.duration = info.duration.min(duration);
        write_descriptor(output, &info).await
    }
}
