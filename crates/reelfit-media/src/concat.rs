//! Joining normalized clips into one stream.
//!
//! The fast path is FFmpeg's concat demuxer with stream copy, which is only
//! valid because every input went through the same normalization profile.
//! If it fails, every clip that still probes is re-encoded through a single
//! concat filter graph.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use reelfit_models::{PlannedClip, PresetProfile};

use crate::engine::TranscodeEngine;
use crate::error::{MediaError, MediaResult};

/// Manifest file name inside the job workspace.
pub const MANIFEST_FILE: &str = "concat_list.txt";
/// Joined output file name inside the job workspace.
pub const CONCAT_OUTPUT_FILE: &str = "concatenated.mp4";

/// Result of concatenation.
#[derive(Debug, Clone)]
pub struct ConcatOutcome {
    pub path: PathBuf,
    /// Whether the re-encoding fallback produced the output
    pub used_fallback: bool,
}

/// Render one manifest line, escaping single quotes for the concat demuxer.
pub fn manifest_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

/// Parse a manifest line back to its path.
pub fn parse_manifest_line(line: &str) -> Option<PathBuf> {
    let quoted = line.trim().strip_prefix("file ")?.trim();
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(PathBuf::from(inner.replace("'\\''", "'")))
}

/// Write the ordered manifest for `clips` into `work_dir`.
pub async fn write_manifest(clips: &[PlannedClip], work_dir: &Path) -> MediaResult<PathBuf> {
    let manifest = work_dir.join(MANIFEST_FILE);
    let mut body = String::new();
    for clip in clips {
        let path = if clip.path.is_absolute() {
            clip.path.clone()
        } else {
            std::path::absolute(&clip.path)?
        };
        body.push_str(&manifest_line(&path));
        body.push('\n');
    }
    fs::write(&manifest, body).await?;
    Ok(manifest)
}

/// Join `clips` in order into `work_dir/concatenated.mp4`.
pub async fn concatenate(
    engine: &dyn TranscodeEngine,
    clips: &[PlannedClip],
    profile: &PresetProfile,
    work_dir: &Path,
) -> MediaResult<ConcatOutcome> {
    if clips.is_empty() {
        return Err(MediaError::concat_failed("no clips to concatenate"));
    }

    let output = work_dir.join(CONCAT_OUTPUT_FILE);
    let manifest = write_manifest(clips, work_dir).await?;

    match engine.concat(&manifest, &output).await {
        Ok(()) => {
            info!(clips = clips.len(), "Concatenated with stream copy");
            return Ok(ConcatOutcome {
                path: output,
                used_fallback: false,
            });
        }
        Err(e) => {
            warn!(
                error = %e,
                diagnostics = e.diagnostics().unwrap_or(""),
                "Stream-copy concatenation failed, re-encoding"
            );
        }
    }

    let mut loadable = Vec::with_capacity(clips.len());
    for clip in clips {
        match engine.probe(&clip.path).await {
            Ok(_) => loadable.push(clip.path.clone()),
            Err(e) => warn!(clip_id = %clip.id, error = %e, "Skipping unreadable clip in fallback"),
        }
    }

    if loadable.is_empty() {
        return Err(MediaError::concat_failed("no clip could be loaded for re-encoding"));
    }

    engine
        .concat_reencode(&loadable, &output, profile)
        .await
        .map_err(|e| MediaError::concat_failed(format!("re-encode fallback failed: {e}")))?;

    info!(
        clips = loadable.len(),
        skipped = clips.len() - loadable.len(),
        "Concatenated with re-encode fallback"
    );

    Ok(ConcatOutcome {
        path: output,
        used_fallback: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use reelfit_models::PresetCatalog;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_line_escaping() {
        let path = Path::new("/tmp/it's here/clip.mp4");
        let line = manifest_line(path);
        assert_eq!(line, "file '/tmp/it'\\''s here/clip.mp4'");
        assert_eq!(parse_manifest_line(&line).unwrap(), path);
        assert!(parse_manifest_line("duration 3").is_none());
    }

    async fn two_clips(engine: &FakeEngine, dir: &Path) -> Vec<PlannedClip> {
        let a = engine.write_clip(dir.join("a.mp4"), 10.0, 1920, 1080).await;
        let b = engine.write_clip(dir.join("b.mp4"), 12.0, 1920, 1080).await;
        vec![PlannedClip::new("a", a, 10.0), PlannedClip::new("b", b, 12.0)]
    }

    #[tokio::test]
    async fn test_stream_copy_path() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new();
        let clips = two_clips(&engine, dir.path()).await;
        let profile = PresetCatalog::builtin().resolve("presentation");

        let outcome = concatenate(&engine, &clips, &profile, dir.path()).await.unwrap();

        assert!(!outcome.used_fallback);
        assert_eq!(engine.reencode_calls(), 0);
        let info = engine.probe(&outcome.path).await.unwrap();
        assert!((info.duration - 22.0).abs() < 1e-9);

        let manifest = fs::read_to_string(dir.path().join(MANIFEST_FILE)).await.unwrap();
        assert_eq!(manifest.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_fallback_after_copy_failure() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new().fail_concat_copy();
        let clips = two_clips(&engine, dir.path()).await;
        let profile = PresetCatalog::builtin().resolve("presentation");

        let outcome = concatenate(&engine, &clips, &profile, dir.path()).await.unwrap();

        assert!(outcome.used_fallback);
        assert_eq!(engine.concat_calls(), 1);
        assert_eq!(engine.reencode_calls(), 1);
        let info = engine.probe(&outcome.path).await.unwrap();
        assert!((info.duration - 22.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fallback_without_loadable_clips_fails() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new().fail_concat_copy();
        let clips = vec![PlannedClip::new("ghost", dir.path().join("missing.mp4"), 5.0)];
        let profile = PresetCatalog::builtin().resolve("presentation");

        let err = concatenate(&engine, &clips, &profile, dir.path()).await.unwrap_err();
        assert!(matches!(err, MediaError::ConcatenationFailed(_)));
        assert_eq!(engine.reencode_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_fallback_is_concatenation_failure() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new().fail_concat_copy().fail_concat_reencode();
        let clips = two_clips(&engine, dir.path()).await;
        let profile = PresetCatalog::builtin().resolve("presentation");

        let err = concatenate(&engine, &clips, &profile, dir.path()).await.unwrap_err();
        assert!(matches!(err, MediaError::ConcatenationFailed(_)));
    }
}
