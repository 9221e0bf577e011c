//! Worker error types.

use thiserror::Error;

use reelfit_media::MediaError;
use reelfit_models::{ModelError, PipelineStage};
use reelfit_source::SourceError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No candidate clips match the selection criteria")]
    NoCandidates,

    #[error("Could not read clip metadata: {0}")]
    ProbeFailure(String),

    #[error("Stage {stage} timed out: {message}")]
    StageTimeout { stage: PipelineStage, message: String },

    #[error("Stage {stage} failed: {message}")]
    StageFailure { stage: PipelineStage, message: String },

    #[error("All {0} clips failed normalization")]
    AllClipsFailed(usize),

    #[error("Concatenation failed: {0}")]
    ConcatenationFailed(String),

    #[error("A batch is already running")]
    AlreadyRunning,

    #[error("No jobs queued")]
    NoJobs,

    #[error("Job cancelled before stage {0}")]
    Cancelled(PipelineStage),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid job: {0}")]
    Model(#[from] ModelError),

    #[error("Clip source error: {0}")]
    Source(#[from] SourceError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn probe_failure(msg: impl Into<String>) -> Self {
        Self::ProbeFailure(msg.into())
    }

    /// Classify a media failure raised while running `stage`.
    ///
    /// Timeouts become `StageTimeout`; normalization and concatenation
    /// outcomes keep their dedicated variants; anything else is a
    /// `StageFailure`.
    pub fn from_stage(stage: PipelineStage, err: MediaError) -> Self {
        match err {
            MediaError::AllClipsFailed { failed } => Self::AllClipsFailed(failed),
            MediaError::ConcatenationFailed(msg) => Self::ConcatenationFailed(msg),
            MediaError::Timeout(secs) => Self::StageTimeout {
                stage,
                message: format!("external call exceeded {secs}s"),
            },
            other => {
                let message = match other.diagnostics() {
                    Some(diag) => format!("{other} ({})", diag.lines().last().unwrap_or(diag)),
                    None => other.to_string(),
                };
                Self::StageFailure { stage, message }
            }
        }
    }

    /// Stage this error is attributed to, when known.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            WorkerError::NoCandidates => Some(PipelineStage::Selecting),
            WorkerError::ProbeFailure(_) => Some(PipelineStage::Fitting),
            WorkerError::AllClipsFailed(_) => Some(PipelineStage::Normalizing),
            WorkerError::ConcatenationFailed(_) => Some(PipelineStage::Concatenating),
            WorkerError::StageTimeout { stage, .. }
            | WorkerError::StageFailure { stage, .. }
            | WorkerError::Cancelled(stage) => Some(*stage),
            _ => None,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::NoCandidates => "no_candidates",
            WorkerError::ProbeFailure(_) => "probe_failure",
            WorkerError::StageTimeout { .. } => "stage_timeout",
            WorkerError::StageFailure { .. } => "stage_failure",
            WorkerError::AllClipsFailed(_) => "all_clips_failed",
            WorkerError::ConcatenationFailed(_) => "concatenation_failed",
            WorkerError::AlreadyRunning => "already_running",
            WorkerError::NoJobs => "no_jobs",
            WorkerError::Cancelled(_) => "cancelled",
            WorkerError::ConfigError(_) => "config",
            WorkerError::Model(_) => "invalid_job",
            WorkerError::Source(_) => "source",
            WorkerError::Media(_) => "media",
            WorkerError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_stage_timeout() {
        let err = WorkerError::from_stage(PipelineStage::Trimming, MediaError::Timeout(300));
        assert!(matches!(
            err,
            WorkerError::StageTimeout {
                stage: PipelineStage::Trimming,
                ..
            }
        ));
        assert_eq!(err.kind(), "stage_timeout");
    }

    #[test]
    fn test_nonzero_exit_maps_to_stage_failure() {
        let media = MediaError::ffmpeg_failed("exit 1", Some("line one\nInvalid data found".into()), Some(1));
        let err = WorkerError::from_stage(PipelineStage::Trimming, media);
        match err {
            WorkerError::StageFailure { stage, message } => {
                assert_eq!(stage, PipelineStage::Trimming);
                assert!(message.contains("Invalid data found"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dedicated_variants_preserved() {
        let err = WorkerError::from_stage(PipelineStage::Normalizing, MediaError::AllClipsFailed { failed: 3 });
        assert!(matches!(err, WorkerError::AllClipsFailed(3)));
        assert_eq!(err.stage(), Some(PipelineStage::Normalizing));

        let err = WorkerError::from_stage(PipelineStage::Concatenating, MediaError::concat_failed("nothing"));
        assert!(matches!(err, WorkerError::ConcatenationFailed(_)));
    }
}
