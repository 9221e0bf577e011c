#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the reelfit pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with hard timeouts
//! - FFprobe metadata parsing
//! - The [`TranscodeEngine`] boundary and its FFmpeg implementation
//! - The media stages: normalization, concatenation (with re-encode
//!   fallback) and trimming
//! - Output quality assessment

pub mod command;
pub mod concat;
pub mod engine;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod normalize;
pub mod probe;
pub mod quality;
pub mod trim;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::{concatenate, ConcatOutcome};
pub use engine::{EngineTimeouts, FfmpegEngine, TranscodeEngine};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use normalize::{normalize_plan, NormalizeOutcome};
pub use probe::{probe_video, probe_video_with_timeout, VideoInfo};
pub use quality::{assess, QualityReport, QualityThresholds};
pub use trim::{trim_to_target, TrimOutcome};
