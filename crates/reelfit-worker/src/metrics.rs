//! Pipeline metrics.
//!
//! Emitted through the `metrics` facade; installing a recorder/exporter is
//! up to the embedding application.

use metrics::{counter, histogram};

use reelfit_models::JobStatus;

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Jobs reaching a terminal status, by status and error kind.
    pub const JOBS_TOTAL: &str = "reelfit_jobs_total";

    /// Wall-clock job duration in seconds, by status.
    pub const JOB_DURATION_SECONDS: &str = "reelfit_job_duration_seconds";

    /// Clips dropped because normalization failed.
    pub const CLIPS_DROPPED_TOTAL: &str = "reelfit_clips_dropped_total";

    /// Concatenations that needed the re-encode fallback.
    pub const CONCAT_FALLBACKS_TOTAL: &str = "reelfit_concat_fallbacks_total";

    /// Outputs cut down to the target duration.
    pub const TRIMS_TOTAL: &str = "reelfit_trims_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a job reaching `status`.
pub fn record_job(status: JobStatus, error_kind: Option<&str>, duration_secs: Option<f64>) {
    counter!(
        names::JOBS_TOTAL,
        "status" => status.as_str(),
        "error" => error_kind.unwrap_or("none").to_string()
    )
    .increment(1);

    if let Some(secs) = duration_secs {
        histogram!(names::JOB_DURATION_SECONDS, "status" => status.as_str()).record(secs);
    }
}

pub fn record_clips_dropped(count: usize) {
    if count > 0 {
        counter!(names::CLIPS_DROPPED_TOTAL).increment(count as u64);
    }
}

pub fn record_concat_fallback() {
    counter!(names::CONCAT_FALLBACKS_TOTAL).increment(1);
}

pub fn record_trim() {
    counter!(names::TRIMS_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_TOTAL.starts_with("reelfit_"));
        assert!(names::JOB_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_job(JobStatus::Completed, None, Some(1.5));
        record_job(JobStatus::Failed, Some("no_candidates"), None);
        record_clips_dropped(0);
        record_clips_dropped(2);
        record_concat_fallback();
        record_trim();
    }
}
