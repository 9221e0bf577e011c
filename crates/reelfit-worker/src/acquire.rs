//! Turning job inputs into local, probed clips.
//!
//! Covers the I/O around selection: building the candidate pool, fetching
//! selected clips into the job workspace, and probing real durations.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use reelfit_media::TranscodeEngine;
use reelfit_models::{CandidateClip, ClipId, ClipSelection, JobInputs, PlannedClip, SelectionCriteria};
use reelfit_source::{search_pages, ClipSource, SourceError};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async_when, RetryConfig};
use crate::selector::ClipSelector;

/// Concurrent downloads per job
const DOWNLOAD_PARALLELISM: usize = 2;

/// Build the candidate pool for a job.
pub async fn gather_candidates(
    inputs: &JobInputs,
    criteria: &SelectionCriteria,
    engine: &dyn TranscodeEngine,
    source: Option<&dyn ClipSource>,
    selector: &ClipSelector,
    config: &WorkerConfig,
) -> WorkerResult<Vec<CandidateClip>> {
    match inputs {
        JobInputs::Candidates { clips } => Ok(clips.clone()),
        JobInputs::Files { paths } => probe_files(engine, paths).await,
        JobInputs::Search { query } => {
            let source = source.ok_or_else(|| WorkerError::config_error("search input requires a clip source"))?;
            let (min, max) = selector.effective_range(criteria);
            let wanted = 2 * selector.optimal_count(criteria, (min + max) / 2.0);

            let retry = RetryConfig::new("clip_search").with_max_retries(config.download_retries);
            let clips = retry_async_when(
                &retry,
                || search_pages(source, query, wanted, config.search_page_size, config.search_max_pages),
                SourceError::is_retryable,
            )
            .await
            .into_result()?;
            Ok(clips)
        }
    }
}

/// Probe local files into candidates, dropping unreadable ones.
async fn probe_files(engine: &dyn TranscodeEngine, paths: &[PathBuf]) -> WorkerResult<Vec<CandidateClip>> {
    let mut clips = Vec::with_capacity(paths.len());
    let mut last_error = None;

    for path in paths {
        match engine.probe(path).await {
            Ok(info) => {
                // Keyed by the whole path: equal file names in different
                // directories are distinct clips
                let uri = path.to_string_lossy();
                clips.push(CandidateClip::local(
                    uri.as_ref(),
                    uri.as_ref(),
                    info.width,
                    info.height,
                    info.duration,
                ));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable input file");
                last_error = Some(e.to_string());
            }
        }
    }

    if clips.is_empty() {
        if let Some(e) = last_error {
            return Err(WorkerError::probe_failure(format!("no input file could be read: {e}")));
        }
    }
    Ok(clips)
}

/// File name for a downloaded clip, safe regardless of what the id contains.
fn download_name(id: &ClipId) -> String {
    let stem: String = id
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{stem}.mp4")
}

/// Make every selected clip available locally, in selection order.
///
/// Remote clips are downloaded into `download_dir` with retries; a clip
/// that still fails is dropped.
pub async fn acquire(
    selection: &ClipSelection,
    source: Option<&dyn ClipSource>,
    download_dir: &Path,
    retries: u32,
) -> WorkerResult<Vec<PlannedClip>> {
    let retry = RetryConfig::new("clip_download").with_max_retries(retries);

    // Collected up front so the spawned job future stays `Send`
    let fetches: Vec<_> = selection
        .clips
        .iter()
        .enumerate()
        .map(|(idx, clip)| {
            let retry = &retry;
            async move {
                if !clip.needs_download() {
                    return Some(PlannedClip::new(clip.id.clone(), &clip.source_uri, clip.duration));
                }
                let Some(source) = source else {
                    warn!(clip_id = %clip.id, "Clip needs a download but no clip source is configured");
                    return None;
                };

                let dest = download_dir.join(format!("{idx:03}_{}", download_name(&clip.id)));
                let result = retry_async_when(retry, || source.download(clip, &dest), SourceError::is_retryable)
                    .await
                    .into_result();
                match result {
                    Ok(()) => {
                        debug!(clip_id = %clip.id, dest = %dest.display(), "Clip downloaded");
                        Some(PlannedClip::new(clip.id.clone(), dest, clip.duration))
                    }
                    Err(e) => {
                        warn!(clip_id = %clip.id, error = %e, "Download failed, dropping clip");
                        None
                    }
                }
            }
        })
        .collect();

    let fetched: Vec<Option<PlannedClip>> = stream::iter(fetches)
        .buffered(DOWNLOAD_PARALLELISM)
        .collect()
        .await;
    let acquired: Vec<PlannedClip> = fetched.into_iter().flatten().collect();

    if acquired.is_empty() {
        return Err(WorkerError::NoCandidates);
    }
    info!(
        selected = selection.len(),
        acquired = acquired.len(),
        "Clips acquired"
    );
    Ok(acquired)
}

/// Replace reported durations with probed ones, dropping unreadable clips.
pub async fn probe_clips(engine: &dyn TranscodeEngine, clips: Vec<PlannedClip>) -> WorkerResult<Vec<PlannedClip>> {
    let total = clips.len();
    let mut probed = Vec::with_capacity(total);
    let mut last_error = String::from("no clips to probe");

    for mut clip in clips {
        match engine.probe(&clip.path).await {
            Ok(info) => {
                clip.duration = info.duration;
                probed.push(clip);
            }
            Err(e) => {
                warn!(clip_id = %clip.id, path = %clip.path.display(), error = %e, "Dropping unreadable clip");
                last_error = e.to_string();
            }
        }
    }

    if probed.is_empty() {
        return Err(WorkerError::probe_failure(format!(
            "all {total} clips unreadable: {last_error}"
        )));
    }
    Ok(probed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelfit_media::testing::FakeEngine;
    use reelfit_source::SourceResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fails downloads of ids listed in `broken`; otherwise writes a clip.
    struct StubSource {
        engine: FakeEngine,
        broken: Vec<&'static str>,
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl ClipSource for StubSource {
        async fn search(&self, _query: &str, page: u32, _page_size: u32) -> SourceResult<Vec<CandidateClip>> {
            if page > 1 {
                return Ok(Vec::new());
            }
            Ok((1..=3)
                .map(|i| {
                    let mut clip = CandidateClip::local(i as u64, "", 1920, 1080, 10.0);
                    clip.download_url = Some(format!("https://clips.test/{i}.mp4"));
                    clip
                })
                .collect())
        }

        async fn download(&self, clip: &CandidateClip, dest: &Path) -> SourceResult<()> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if self.broken.contains(&clip.id.as_str()) {
                return Err(SourceError::from_http_status(404, "gone"));
            }
            self.engine.write_clip(dest, 9.5, 1920, 1080).await;
            Ok(())
        }
    }

    fn remote(id: &str) -> CandidateClip {
        let mut clip = CandidateClip::local(id, "", 1920, 1080, 10.0);
        clip.download_url = Some(format!("https://clips.test/{id}.mp4"));
        clip
    }

    #[tokio::test]
    async fn test_acquire_downloads_and_drops_failures() {
        let dir = TempDir::new().unwrap();
        let source = StubSource {
            engine: FakeEngine::new(),
            broken: vec!["b"],
            downloads: AtomicUsize::new(0),
        };
        let selection = ClipSelection {
            clips: vec![remote("a"), remote("b"), remote("c")],
            insufficient_content: false,
            estimated_duration: 30.0,
        };

        let clips = acquire(&selection, Some(&source), dir.path(), 2).await.unwrap();
        let ids: Vec<_> = clips.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(clips.iter().all(|c| c.path.starts_with(dir.path())));
        // 404 is permanent: one attempt for "b"
        assert_eq!(source.downloads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_acquire_without_any_clip_fails() {
        let dir = TempDir::new().unwrap();
        let selection = ClipSelection {
            clips: vec![remote("a")],
            insufficient_content: false,
            estimated_duration: 10.0,
        };
        let err = acquire(&selection, None, dir.path(), 0).await.unwrap_err();
        assert!(matches!(err, WorkerError::NoCandidates));
    }

    #[tokio::test]
    async fn test_probe_clips_uses_real_durations() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new();
        let good = engine.write_clip(dir.path().join("good.mp4"), 7.25, 1280, 720).await;

        let clips = vec![
            PlannedClip::new("good", good, 10.0),
            PlannedClip::new("missing", dir.path().join("missing.mp4"), 10.0),
        ];
        let probed = probe_clips(&engine, clips).await.unwrap();
        assert_eq!(probed.len(), 1);
        assert_eq!(probed[0].duration, 7.25);

        let err = probe_clips(&engine, vec![PlannedClip::new("x", dir.path().join("x.mp4"), 1.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::ProbeFailure(_)));
    }

    #[tokio::test]
    async fn test_files_input_is_probed() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new();
        let a = engine.write_clip(dir.path().join("beach.mp4"), 12.0, 1920, 1080).await;
        let missing = dir.path().join("nope.mp4");

        let inputs = JobInputs::Files { paths: vec![a, missing] };
        let clips = gather_candidates(
            &inputs,
            &SelectionCriteria::new(30.0),
            &engine,
            None,
            &ClipSelector::default(),
            &WorkerConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].id.as_str(), clips[0].source_uri);
        assert!(clips[0].source_uri.ends_with("beach.mp4"));
        assert_eq!(clips[0].duration, 12.0);
    }

    #[tokio::test]
    async fn test_same_file_name_in_different_dirs_stays_distinct() {
        let dir = TempDir::new().unwrap();
        let engine = FakeEngine::new();
        let first = engine.write_clip(dir.path().join("day1/clip.mp4"), 10.0, 1920, 1080).await;
        let second = engine.write_clip(dir.path().join("day2/clip.mp4"), 10.0, 1920, 1080).await;

        let inputs = JobInputs::Files { paths: vec![first, second] };
        let criteria = SelectionCriteria::new(20.0);
        let selector = ClipSelector::default();
        let clips = gather_candidates(&inputs, &criteria, &engine, None, &selector, &WorkerConfig::default())
            .await
            .unwrap();

        assert_eq!(clips.len(), 2);
        assert_ne!(clips[0].id, clips[1].id);
        assert_eq!(selector.filter(&clips, &criteria).len(), 2);
    }

    #[tokio::test]
    async fn test_search_input_requires_source() {
        let engine = FakeEngine::new();
        let inputs = JobInputs::Search { query: "sea".into() };
        let err = gather_candidates(
            &inputs,
            &SelectionCriteria::new(30.0),
            &engine,
            None,
            &ClipSelector::default(),
            &WorkerConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_search_input_collects_pages() {
        let source = StubSource {
            engine: FakeEngine::new(),
            broken: vec![],
            downloads: AtomicUsize::new(0),
        };
        let inputs = JobInputs::Search { query: "sea".into() };
        let clips = gather_candidates(
            &inputs,
            &SelectionCriteria::new(30.0),
            &FakeEngine::new(),
            Some(&source),
            &ClipSelector::default(),
            &WorkerConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(clips.len(), 3);
        assert!(clips.iter().all(|c| c.needs_download()));
    }

    #[test]
    fn test_download_name_is_sanitized() {
        assert_eq!(download_name(&ClipId::new("../a b")), "___a_b.mp4");
        assert_eq!(download_name(&ClipId::new("123")), "123.mp4");
    }
}
