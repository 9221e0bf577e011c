//! Output quality checks.
//!
//! Checks never fail a job: they produce a report whose issues are logged
//! and whose score is attached to the job outcome.

use serde::{Deserialize, Serialize};

use crate::probe::VideoInfo;

/// Minimum acceptable output bitrate in kbit/s
pub const DEFAULT_MIN_BITRATE_KBPS: u64 = 1000;
/// Minimum acceptable output width
pub const DEFAULT_MIN_WIDTH: u32 = 640;
/// Minimum acceptable output height
pub const DEFAULT_MIN_HEIGHT: u32 = 360;

const RESOLUTION_WEIGHT: f64 = 0.4;
const BITRATE_WEIGHT: f64 = 0.4;
const FPS_WEIGHT: f64 = 0.2;

/// Lower bounds an output must meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub min_bitrate_kbps: u64,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_bitrate_kbps: DEFAULT_MIN_BITRATE_KBPS,
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
        }
    }
}

/// Quality assessment of one output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub resolution_score: f64,
    pub bitrate_score: f64,
    pub fps_score: f64,
    /// Weighted score in [0, 1]
    pub overall_score: f64,
    /// Threshold violations, empty when the output passed
    pub issues: Vec<String>,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Assess `info` against `thresholds`.
pub fn assess(info: &VideoInfo, thresholds: &QualityThresholds) -> QualityReport {
    let bitrate_kbps = info.bitrate_kbps();
    let mut issues = Vec::new();

    if bitrate_kbps < thresholds.min_bitrate_kbps {
        issues.push(format!(
            "bitrate {}kbps is below minimum {}kbps",
            bitrate_kbps, thresholds.min_bitrate_kbps
        ));
    }
    if info.width.min(info.height) < thresholds.min_width.min(thresholds.min_height)
        || info.width.max(info.height) < thresholds.min_width.max(thresholds.min_height)
    {
        issues.push(format!(
            "resolution {}x{} is below minimum {}x{}",
            info.width, info.height, thresholds.min_width, thresholds.min_height
        ));
    }

    let resolution_score = resolution_score(info.width, info.height);
    let bitrate_score = bitrate_score(bitrate_kbps, info.width, info.height);
    let fps_score = fps_score(info.fps);

    QualityReport {
        resolution_score,
        bitrate_score,
        fps_score,
        overall_score: resolution_score * RESOLUTION_WEIGHT
            + bitrate_score * BITRATE_WEIGHT
            + fps_score * FPS_WEIGHT,
        issues,
    }
}

// Portrait frames are scored by their long and short edges
fn edges(width: u32, height: u32) -> (u32, u32) {
    (width.max(height), width.min(height))
}

fn resolution_score(width: u32, height: u32) -> f64 {
    match edges(width, height) {
        (l, s) if l >= 1920 && s >= 1080 => 1.0,
        (l, s) if l >= 1280 && s >= 720 => 0.8,
        (l, s) if l >= 854 && s >= 480 => 0.6,
        (l, s) if l >= 640 && s >= 360 => 0.4,
        _ => 0.2,
    }
}

fn bitrate_score(bitrate_kbps: u64, width: u32, height: u32) -> f64 {
    let pixels = width as u64 * height as u64;
    let (expected_min, expected_max) = if pixels >= 1920 * 1080 {
        (5000, 15000)
    } else if pixels >= 1280 * 720 {
        (2500, 8000)
    } else if pixels >= 854 * 480 {
        (1000, 4000)
    } else {
        (500, 2000)
    };

    if bitrate_kbps >= expected_max {
        1.0
    } else if bitrate_kbps <= expected_min {
        0.3
    } else {
        let ratio = (bitrate_kbps - expected_min) as f64 / (expected_max - expected_min) as f64;
        0.3 + 0.7 * ratio
    }
}

fn fps_score(fps: f64) -> f64 {
    match fps {
        f if f >= 60.0 => 1.0,
        f if f >= 30.0 => 0.9,
        f if f >= 24.0 => 0.8,
        f if f >= 15.0 => 0.6,
        _ => 0.3,
    }
}
