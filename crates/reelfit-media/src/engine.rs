//! The transcoding engine boundary.
//!
//! Every stage talks to FFmpeg through [`TranscodeEngine`], so tests can
//! swap in a fake that never spawns a process.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use reelfit_models::PresetProfile;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{filter_concat_letterboxed, filter_letterbox};
use crate::probe::{probe_video_with_timeout, VideoInfo};

/// Default timeout for normalizing one clip
pub const DEFAULT_NORMALIZE_TIMEOUT_SECS: u64 = 300;
/// Default timeout for joining all clips
pub const DEFAULT_CONCAT_TIMEOUT_SECS: u64 = 600;
/// Default timeout for the final cut
pub const DEFAULT_TRIM_TIMEOUT_SECS: u64 = 300;
/// Default timeout for one ffprobe call
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Per-call timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimeouts {
    pub normalize_secs: u64,
    pub concat_secs: u64,
    pub trim_secs: u64,
    pub probe_secs: u64,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            normalize_secs: DEFAULT_NORMALIZE_TIMEOUT_SECS,
            concat_secs: DEFAULT_CONCAT_TIMEOUT_SECS,
            trim_secs: DEFAULT_TRIM_TIMEOUT_SECS,
            probe_secs: DEFAULT_PROBE_TIMEOUT_SECS,
        }
    }
}

/// External transcoding operations used by the pipeline.
///
/// Each call is atomic: it either produces `output` or returns an error.
/// Implementations must bound every call with a timeout.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Read stream metadata.
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Letterbox to the profile's frame, conform fps and codec, strip audio.
    async fn normalize(&self, input: &Path, output: &Path, profile: &PresetProfile) -> MediaResult<()>;

    /// Join the files listed in a concat manifest without re-encoding.
    async fn concat(&self, manifest: &Path, output: &Path) -> MediaResult<()>;

    /// Decode every input and re-encode them into one continuous stream.
    async fn concat_reencode(&self, inputs: &[PathBuf], output: &Path, profile: &PresetProfile) -> MediaResult<()>;

    /// Copy the first `duration` seconds of `input`.
    async fn trim(&self, input: &Path, duration: f64, output: &Path) -> MediaResult<()>;
}

/// Build the per-clip normalization command.
pub fn normalize_command(input: &Path, output: &Path, profile: &PresetProfile) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_filter(filter_letterbox(profile.resolution))
        .output_args(profile.to_ffmpeg_args())
        .no_audio()
        .output_args(["-movflags", "+faststart"])
}

/// Build the stream-copy concat command.
pub fn concat_command(manifest: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::with_output(output)
        .input(manifest)
        .input_args(["-f", "concat", "-safe", "0"])
        .stream_copy()
}

/// Build the re-encoding concat command over `inputs`.
pub fn concat_reencode_command(inputs: &[PathBuf], output: &Path, profile: &PresetProfile) -> FfmpegCommand {
    let cmd = inputs
        .iter()
        .fold(FfmpegCommand::with_output(output), |cmd, path| cmd.input(path));

    cmd.filter_complex(filter_concat_letterboxed(inputs.len(), profile.resolution, profile.fps))
        .map("[outv]")
        .output_args(profile.to_ffmpeg_args())
        .no_audio()
}

/// Build the copy-mode trim command.
pub fn trim_command(input: &Path, duration: f64, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .duration(duration)
        .stream_copy()
        .output_args(["-avoid_negative_ts", "make_zero"])
}

/// [`TranscodeEngine`] backed by the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    timeouts: EngineTimeouts,
}

impl FfmpegEngine {
    pub fn new(timeouts: EngineTimeouts) -> Self {
        Self { timeouts }
    }

    pub fn timeouts(&self) -> EngineTimeouts {
        self.timeouts
    }

    async fn run(&self, cmd: FfmpegCommand, timeout_secs: u64) -> MediaResult<()> {
        FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video_with_timeout(path, self.timeouts.probe_secs).await
    }

    async fn normalize(&self, input: &Path, output: &Path, profile: &PresetProfile) -> MediaResult<()> {
        debug!(input = %input.display(), resolution = %profile.resolution, "Normalizing clip");
        self.run(normalize_command(input, output, profile), self.timeouts.normalize_secs)
            .await
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> MediaResult<()> {
        self.run(concat_command(manifest, output), self.timeouts.concat_secs).await
    }

    async fn concat_reencode(&self, inputs: &[PathBuf], output: &Path, profile: &PresetProfile) -> MediaResult<()> {
        self.run(
            concat_reencode_command(inputs, output, profile),
            self.timeouts.concat_secs,
        )
        .await
    }

    async fn trim(&self, input: &Path, duration: f64, output: &Path) -> MediaResult<()> {
        self.run(trim_command(input, duration, output), self.timeouts.trim_secs)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelfit_models::{AspectPreference, PresetCatalog};

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_normalize_command_shape() {
        let profile = PresetCatalog::builtin()
            .resolve("presentation")
            .oriented_for(AspectPreference::Vertical);
        let args = normalize_command(Path::new("in.mp4"), Path::new("out.mp4"), &profile).build_args();

        assert!(args.iter().any(|a| a.contains("scale=1080:1920")));
        assert!(has_pair(&args, "-r", "30"));
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(has_pair(&args, "-b:v", "10000k"));
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_concat_command_shape() {
        let args = concat_command(Path::new("list.txt"), Path::new("joined.mp4")).build_args();
        assert!(has_pair(&args, "-f", "concat"));
        assert!(has_pair(&args, "-safe", "0"));
        assert!(has_pair(&args, "-c", "copy"));
    }

    #[test]
    fn test_reencode_command_has_one_input_per_clip() {
        let profile = PresetCatalog::builtin().resolve("mobile");
        let inputs = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
        let args = concat_reencode_command(&inputs, Path::new("joined.mp4"), &profile).build_args();

        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert!(has_pair(&args, "-map", "[outv]"));
        assert!(args.iter().any(|a| a.contains("concat=n=2:v=1:a=0")));
    }

    #[test]
    fn test_trim_command_shape() {
        let args = trim_command(Path::new("joined.mp4"), 25.0, Path::new("final.mp4")).build_args();
        assert!(has_pair(&args, "-t", "25.000"));
        assert!(has_pair(&args, "-c", "copy"));
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = FfmpegEngine::default().timeouts();
        assert_eq!(timeouts.normalize_secs, 300);
        assert_eq!(timeouts.concat_secs, 600);
    }
}
