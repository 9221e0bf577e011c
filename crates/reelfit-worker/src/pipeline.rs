//! The per-job pipeline state machine.
//!
//! `Selecting -> Fitting -> Normalizing -> Concatenating -> Trimming -> Done`,
//! with `Failed` reachable from every stage. Stages run strictly in order;
//! a stop request is honored at the next stage boundary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{warn, Instrument};

use reelfit_media::{
    assess, concatenate, move_file, normalize_plan, trim_to_target, QualityReport, TranscodeEngine,
};
use reelfit_models::{Job, JobId, PipelineStage, PresetCatalog};
use reelfit_source::ClipSource;

use crate::acquire::{acquire, gather_candidates, probe_clips};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::fitter::DurationFitter;
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::{ProgressSink, ProgressTracker};
use crate::selector::ClipSelector;
use crate::workspace::JobWorkspace;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub output_path: PathBuf,
    /// Output duration in seconds
    pub duration: f64,
    /// Entries in the fitted plan, repeats included
    pub planned_clips: usize,
    /// Distinct clips that made it into the output
    pub unique_clips: usize,
    pub dropped_clips: usize,
    pub insufficient_content: bool,
    pub used_concat_fallback: bool,
    pub trimmed: bool,
    pub quality: Option<QualityReport>,
}

/// Runs one job end to end.
///
/// The duration policy, selection tunables and presets are injected; the
/// orchestrator itself never retries a failed stage.
pub struct PipelineOrchestrator {
    engine: Arc<dyn TranscodeEngine>,
    source: Option<Arc<dyn ClipSource>>,
    presets: PresetCatalog,
    selector: ClipSelector,
    fitter: DurationFitter,
    config: WorkerConfig,
}

impl PipelineOrchestrator {
    pub fn new(engine: Arc<dyn TranscodeEngine>, config: WorkerConfig) -> Self {
        Self {
            engine,
            source: None,
            presets: PresetCatalog::builtin(),
            selector: ClipSelector::new(config.selection.clone()),
            fitter: DurationFitter::new(config.duration_policy),
            config,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ClipSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_presets(mut self, presets: PresetCatalog) -> Self {
        self.presets = presets;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    /// Run `job`, reporting progress to `sink`.
    ///
    /// The job's scratch directory is removed before returning, whatever
    /// the result.
    pub async fn run(
        &self,
        job: &Job,
        sink: &dyn ProgressSink,
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(&job.id, "assemble");
        let span = logger.create_span();

        async {
            logger.log_start(&format!(
                "inputs={} target={}s preset={}",
                job.inputs.kind(),
                job.criteria.target_duration,
                job.preset
            ));

            let workspace = JobWorkspace::create(&self.config.work_dir, &job.id).await?;
            let tracker = ProgressTracker::new(sink);
            let result = self.execute(job, &workspace, &tracker, cancel, &logger).await;
            workspace.cleanup();

            match &result {
                Ok(outcome) => logger.log_completion(&format!(
                    "output={} duration={:.3}s clips={}",
                    outcome.output_path.display(),
                    outcome.duration,
                    outcome.planned_clips
                )),
                Err(e) => {
                    let stage = e.stage().unwrap_or(PipelineStage::Failed);
                    logger.log_error(&format!("failed during {stage}: {e}"));
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        job: &Job,
        workspace: &JobWorkspace,
        tracker: &ProgressTracker<'_>,
        cancel: &watch::Receiver<bool>,
        logger: &JobLogger,
    ) -> WorkerResult<JobOutcome> {
        let engine = self.engine.as_ref();
        let target = job.criteria.target_duration;

        let enter = |stage: PipelineStage| -> WorkerResult<()> {
            if *cancel.borrow() {
                return Err(WorkerError::Cancelled(stage));
            }
            logger.log_stage(stage);
            tracker.enter(stage);
            Ok(())
        };

        enter(PipelineStage::Selecting)?;
        let candidates = gather_candidates(
            &job.inputs,
            &job.criteria,
            engine,
            self.source.as_deref(),
            &self.selector,
            &self.config,
        )
        .await?;
        let selection = self.selector.select(&candidates, &job.criteria)?;
        tracker.report(PipelineStage::Selecting, 1, 2);
        let acquired = acquire(
            &selection,
            self.source.as_deref(),
            &workspace.downloads(),
            self.config.download_retries,
        )
        .await?;

        enter(PipelineStage::Fitting)?;
        let probed = probe_clips(engine, acquired).await?;
        let plan = self.fitter.fit(probed, target, selection.insufficient_content);
        logger.log_progress(&format!(
            "plan has {} entries ({} unique), {:.3}s for a {:.3}s target",
            plan.len(),
            plan.unique_sources(),
            plan.aggregate_duration(),
            target
        ));

        enter(PipelineStage::Normalizing)?;
        let profile = self.presets.resolve(&job.preset).oriented_for(job.criteria.aspect);
        let normalized_dir = workspace.path().join("normalized");
        tokio::fs::create_dir_all(&normalized_dir).await?;
        let normalized = normalize_plan(
            engine,
            &plan,
            &profile,
            &normalized_dir,
            self.config.normalize_parallelism,
            |done, total| tracker.report(PipelineStage::Normalizing, done, total),
        )
        .await
        .map_err(|e| WorkerError::from_stage(PipelineStage::Normalizing, e))?;
        metrics::record_clips_dropped(normalized.dropped.len());
        if !normalized.dropped.is_empty() {
            logger.log_warning(&format!("{} clips dropped during normalization", normalized.dropped.len()));
        }

        enter(PipelineStage::Concatenating)?;
        let joined = concatenate(engine, &normalized.clips, &profile, workspace.path())
            .await
            .map_err(|e| WorkerError::from_stage(PipelineStage::Concatenating, e))?;
        if joined.used_fallback {
            metrics::record_concat_fallback();
        }

        enter(PipelineStage::Trimming)?;
        // Cut inside the workspace; the output path only ever receives a finished file
        let staged = workspace.path().join("final.mp4");
        let trimmed = trim_to_target(engine, &joined.path, target, &staged)
            .await
            .map_err(|e| WorkerError::from_stage(PipelineStage::Trimming, e))?;
        move_file(&staged, &job.output_path)
            .await
            .map_err(|e| WorkerError::from_stage(PipelineStage::Trimming, e))?;
        if trimmed.trimmed {
            metrics::record_trim();
        }

        // Output checks only warn
        let quality = match engine.probe(&job.output_path).await {
            Ok(info) => {
                let report = assess(&info, &self.config.quality);
                for issue in &report.issues {
                    logger.log_warning(issue);
                }
                Some(report)
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Could not probe output for quality checks");
                None
            }
        };

        logger.log_stage(PipelineStage::Done);
        tracker.finish();

        let unique_clips = {
            let mut ids: Vec<_> = normalized.clips.iter().map(|c| &c.id).collect();
            ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            ids.dedup();
            ids.len()
        };

        Ok(JobOutcome {
            job_id: job.id.clone(),
            output_path: job.output_path.clone(),
            duration: trimmed.duration,
            planned_clips: normalized.clips.len(),
            unique_clips,
            dropped_clips: normalized.dropped.len(),
            insufficient_content: plan.insufficient_content,
            used_concat_fallback: joined.used_fallback,
            trimmed: trimmed.trimmed,
            quality,
        })
    }
}
