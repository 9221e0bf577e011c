//! Job definitions for batch processing.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::clip::CandidateClip;
use crate::criteria::SelectionCriteria;
use crate::error::{ModelError, ModelResult};
use crate::job_status::JobStatus;
use crate::preset::DEFAULT_PRESET_NAME;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a job's clips come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobInputs {
    /// Pre-fetched candidate metadata (local paths or download URLs)
    Candidates { clips: Vec<CandidateClip> },
    /// Local media files, probed to build candidates
    Files { paths: Vec<PathBuf> },
    /// Keyword search against the configured clip source
    Search { query: String },
}

impl JobInputs {
    pub fn kind(&self) -> &'static str {
        match self {
            JobInputs::Candidates { .. } => "candidates",
            JobInputs::Files { .. } => "files",
            JobInputs::Search { .. } => "search",
        }
    }
}

/// One end-to-end request producing a single output video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    #[serde(default)]
    pub id: JobId,

    /// Clip inputs
    pub inputs: JobInputs,

    /// Selection constraints
    pub criteria: SelectionCriteria,

    /// Preset name (unknown names fall back to the default preset)
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Destination of the final artifact
    pub output_path: PathBuf,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completed or failed at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Output quality score (if completed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

fn default_preset() -> String {
    DEFAULT_PRESET_NAME.to_string()
}

impl Job {
    /// Create a new queued job.
    pub fn new(inputs: JobInputs, criteria: SelectionCriteria, output_path: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            inputs,
            criteria,
            preset: default_preset(),
            output_path: output_path.into(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            quality_score: None,
        }
    }

    /// Set the preset name.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Move to `next`, rejecting any transition that is not forward.
    pub fn transition(&mut self, next: JobStatus) -> ModelResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark job as processing.
    pub fn start(&mut self) -> ModelResult<()> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark job as completed.
    pub fn complete(&mut self, quality_score: Option<f64>) -> ModelResult<()> {
        self.transition(JobStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.quality_score = quality_score;
        Ok(())
    }

    /// Mark job as failed.
    pub fn fail(&mut self, error: impl Into<String>) -> ModelResult<()> {
        self.transition(JobStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Seconds between start and end, once both are known.
    pub fn elapsed_seconds(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_status::JobStatusSnapshot;

    fn sample_job() -> Job {
        Job::new(
            JobInputs::Search {
                query: "ocean waves".into(),
            },
            SelectionCriteria::new(60.0),
            "/tmp/out.mp4",
        )
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = sample_job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.preset, "presentation");

        job.start().unwrap();
        assert!(job.started_at.is_some());

        job.complete(Some(0.9)).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.elapsed_seconds().unwrap() >= 0.0);

        let snapshot = JobStatusSnapshot::from(&job);
        assert_eq!(snapshot.output_path, Some(PathBuf::from("/tmp/out.mp4")));
        assert_eq!(snapshot.quality_score, Some(0.9));
    }

    #[test]
    fn test_status_never_regresses() {
        let mut job = sample_job();
        job.start().unwrap();
        job.fail("boom").unwrap();

        assert!(job.start().is_err());
        assert!(job.complete(None).is_err());
        assert_eq!(job.status, JobStatus::Failed);

        let snapshot = JobStatusSnapshot::from(&job);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
        assert!(snapshot.output_path.is_none());
    }

    #[test]
    fn test_job_from_json() {
        let json = r#"{
            "inputs": {"kind": "files", "paths": ["/media/a.mp4", "/media/b.mp4"]},
            "criteria": {"target_duration": 30.0},
            "preset": "mobile",
            "output_path": "/tmp/mobile.mp4"
        }"#;

        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.inputs.kind(), "files");
        assert_eq!(job.preset, "mobile");
        assert_eq!(job.status, JobStatus::Queued);
        assert!(!job.id.as_str().is_empty());
    }
}
