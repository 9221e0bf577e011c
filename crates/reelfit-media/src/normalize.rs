//! Per-clip normalization to a uniform output profile.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reelfit_models::{ClipId, ClipPlan, PlannedClip, PresetProfile};

use crate::engine::TranscodeEngine;
use crate::error::{MediaError, MediaResult};

/// Result of normalizing a plan.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    /// Normalized entries in plan order
    pub clips: Vec<PlannedClip>,
    /// Source clips that failed and were dropped
    pub dropped: Vec<ClipId>,
}

/// Normalize every distinct source clip in `plan` into `work_dir`.
///
/// A source repeated by duration fitting is transcoded once and its output
/// reused. Failed clips are logged and dropped; the call only fails when no
/// clip succeeds. `on_clip_done(done, total)` is called after each source.
pub async fn normalize_plan<F>(
    engine: &dyn TranscodeEngine,
    plan: &ClipPlan,
    profile: &PresetProfile,
    work_dir: &Path,
    parallelism: usize,
    mut on_clip_done: F,
) -> MediaResult<NormalizeOutcome>
where
    F: FnMut(usize, usize),
{
    let mut sources: Vec<&PlannedClip> = Vec::new();
    for entry in &plan.entries {
        if !sources.iter().any(|s| s.id == entry.id) {
            sources.push(entry);
        }
    }
    let total = sources.len();

    // Collected up front so the spawned job future stays `Send`
    let jobs: Vec<_> = sources
        .iter()
        .enumerate()
        .map(|(idx, clip)| {
            let output = work_dir.join(format!("normalized_{:03}.mp4", idx));
            async move {
                let result = engine.normalize(&clip.path, &output, profile).await;
                (clip.id.clone(), output, result)
            }
        })
        .collect();

    let mut normalized: HashMap<ClipId, PathBuf> = HashMap::with_capacity(total);
    let mut dropped = Vec::new();
    let mut done = 0;

    let mut results = stream::iter(jobs).buffer_unordered(parallelism.max(1));
    while let Some((id, output, result)) = results.next().await {
        done += 1;
        match result {
            Ok(()) => {
                normalized.insert(id, output);
            }
            Err(e) => {
                warn!(clip_id = %id, error = %e, "Clip normalization failed, dropping clip");
                dropped.push(id);
            }
        }
        on_clip_done(done, total);
    }

    if normalized.is_empty() {
        return Err(MediaError::AllClipsFailed { failed: total });
    }

    let clips: Vec<PlannedClip> = plan
        .entries
        .iter()
        .filter_map(|entry| {
            normalized
                .get(&entry.id)
                .map(|path| PlannedClip::new(entry.id.clone(), path.clone(), entry.duration))
        })
        .collect();

    info!(
        normalized = normalized.len(),
        dropped = dropped.len(),
        entries = clips.len(),
        resolution = %profile.resolution,
        "Normalization complete"
    );

    Ok(NormalizeOutcome { clips, dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use reelfit_models::{PresetCatalog, Resolution};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_repeated_sources_are_normalized_once() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new();
        let a = engine.write_clip(dir.path().join("a.mp4"), 10.0, 1920, 1080).await;
        let b = engine.write_clip(dir.path().join("b.mp4"), 8.0, 1920, 1080).await;

        let plan = ClipPlan::new(
            vec![
                PlannedClip::new("a", a.clone(), 10.0),
                PlannedClip::new("b", b.clone(), 8.0),
                PlannedClip::new("a", a, 10.0),
                PlannedClip::new("b", b, 8.0),
            ],
            false,
        );
        let profile = PresetCatalog::builtin().resolve("presentation");

        let mut progress = Vec::new();
        let outcome = normalize_plan(&engine, &plan, &profile, dir.path(), 2, |d, t| progress.push((d, t)))
            .await
            .unwrap();

        assert_eq!(outcome.clips.len(), 4);
        assert_eq!(engine.normalize_calls(), 2);
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
        assert_eq!(outcome.clips[0].path, outcome.clips[2].path);

        let info = engine.probe(&outcome.clips[0].path).await.unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[tokio::test]
    async fn test_failed_clip_is_dropped() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new().fail_normalize_matching("broken");
        let good = engine.write_clip(dir.path().join("good.mp4"), 10.0, 1280, 720).await;
        let bad = engine.write_clip(dir.path().join("broken.mp4"), 10.0, 1280, 720).await;

        let plan = ClipPlan::new(
            vec![PlannedClip::new("good", good, 10.0), PlannedClip::new("bad", bad, 10.0)],
            false,
        );
        let profile = PresetCatalog::builtin()
            .resolve("presentation")
            .oriented_for(reelfit_models::AspectPreference::Vertical);

        let outcome = normalize_plan(&engine, &plan, &profile, dir.path(), 1, |_, _| {})
            .await
            .unwrap();

        assert_eq!(outcome.clips.len(), 1);
        assert_eq!(outcome.dropped, vec![ClipId::from("bad")]);
        assert_eq!(engine.normalized_resolutions(), vec![Resolution::new(1080, 1920)]);
    }

    #[tokio::test]
    async fn test_all_clips_failed() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new().fail_normalize_matching(".mp4");
        let a = engine.write_clip(dir.path().join("a.mp4"), 10.0, 1280, 720).await;

        let plan = ClipPlan::new(vec![PlannedClip::new("a", a, 10.0)], false);
        let profile = PresetCatalog::builtin().resolve("mobile");

        let err = normalize_plan(&engine, &plan, &profile, dir.path(), 2, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::AllClipsFailed { failed: 1 }));
    }
}
