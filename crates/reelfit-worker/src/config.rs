//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;

use reelfit_media::{EngineTimeouts, QualityThresholds};

use crate::error::{WorkerError, WorkerResult};
use crate::fitter::DurationPolicy;

/// Tunables for clip selection.
///
/// The long-form threshold and insufficiency ratio have no deeper meaning
/// than "worked well in practice"; they are kept adjustable.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    /// Targets longer than this (seconds) widen the accepted clip range
    pub long_form_threshold: f64,
    /// Seconds subtracted from the minimum clip duration for long targets
    pub widen_min_by: f64,
    /// Seconds added to the maximum clip duration for long targets
    pub widen_max_by: f64,
    /// Widened minimum never goes below this
    pub widened_min_floor: f64,
    /// Widened maximum never goes above this
    pub widened_max_ceiling: f64,
    /// Selections estimated below `ratio * target` are flagged insufficient
    pub insufficiency_ratio: f64,
    /// Extra clips selected on top of the estimated count
    pub count_buffer: usize,
    /// Lower bound on the number of selected clips
    pub min_clip_count: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            long_form_threshold: 600.0,
            widen_min_by: 5.0,
            widen_max_by: 15.0,
            widened_min_floor: 5.0,
            widened_max_ceiling: 60.0,
            insufficiency_ratio: 0.8,
            count_buffer: 2,
            min_clip_count: 5,
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_workers: usize,
    /// Maximum concurrent normalizations within one job
    pub normalize_parallelism: usize,
    /// Parent directory of per-job workspaces
    pub work_dir: PathBuf,
    /// Hard limits on external transcoding calls
    pub timeouts: EngineTimeouts,
    /// How short plans are extended
    pub duration_policy: DurationPolicy,
    pub selection: SelectionPolicy,
    /// Output checks run after trimming
    pub quality: QualityThresholds,
    /// Download retries per clip (not counting the first attempt)
    pub download_retries: u32,
    /// Search page size
    pub search_page_size: u32,
    /// Maximum search pages per job
    pub search_max_pages: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            normalize_parallelism: 2,
            work_dir: std::env::temp_dir().join("reelfit"),
            timeouts: EngineTimeouts::default(),
            duration_policy: DurationPolicy::default(),
            selection: SelectionPolicy::default(),
            quality: QualityThresholds::default(),
            download_retries: 3,
            search_page_size: 80,
            search_max_pages: 5,
        }
    }
}

/// Read `name` and parse it, or fall back to `default` when unset.
fn env_or<T: FromStr>(name: &str, default: T) -> WorkerResult<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| WorkerError::config_error(format!("{name} has invalid value '{raw}'"))),
        _ => Ok(default),
    }
}

impl WorkerConfig {
    /// Create config from `REELFIT_*` environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();
        let selection_defaults = SelectionPolicy::default();
        let timeout_defaults = defaults.timeouts;

        let duration_policy = match std::env::var("REELFIT_DURATION_POLICY") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse::<DurationPolicy>()?,
            _ => defaults.duration_policy,
        };
        let duration_policy = match duration_policy {
            DurationPolicy::WeightedExtend {
                weight_cap,
                min_clip_duration,
            } => DurationPolicy::WeightedExtend {
                weight_cap: env_or("REELFIT_WEIGHT_CAP_SECS", weight_cap)?,
                min_clip_duration: env_or("REELFIT_EXTEND_MIN_CLIP_SECS", min_clip_duration)?,
            },
            other => other,
        };

        let config = Self {
            max_workers: env_or("REELFIT_MAX_WORKERS", defaults.max_workers)?,
            normalize_parallelism: env_or("REELFIT_NORMALIZE_PARALLELISM", defaults.normalize_parallelism)?,
            work_dir: std::env::var("REELFIT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            timeouts: EngineTimeouts {
                normalize_secs: env_or("REELFIT_NORMALIZE_TIMEOUT_SECS", timeout_defaults.normalize_secs)?,
                concat_secs: env_or("REELFIT_CONCAT_TIMEOUT_SECS", timeout_defaults.concat_secs)?,
                trim_secs: env_or("REELFIT_TRIM_TIMEOUT_SECS", timeout_defaults.trim_secs)?,
                probe_secs: env_or("REELFIT_PROBE_TIMEOUT_SECS", timeout_defaults.probe_secs)?,
            },
            duration_policy,
            selection: SelectionPolicy {
                long_form_threshold: env_or("REELFIT_LONG_FORM_THRESHOLD_SECS", selection_defaults.long_form_threshold)?,
                widen_min_by: selection_defaults.widen_min_by,
                widen_max_by: selection_defaults.widen_max_by,
                widened_min_floor: env_or("REELFIT_WIDENED_MIN_FLOOR_SECS", selection_defaults.widened_min_floor)?,
                widened_max_ceiling: env_or(
                    "REELFIT_WIDENED_MAX_CEILING_SECS",
                    selection_defaults.widened_max_ceiling,
                )?,
                insufficiency_ratio: env_or("REELFIT_INSUFFICIENCY_RATIO", selection_defaults.insufficiency_ratio)?,
                count_buffer: env_or("REELFIT_COUNT_BUFFER", selection_defaults.count_buffer)?,
                min_clip_count: env_or("REELFIT_MIN_CLIP_COUNT", selection_defaults.min_clip_count)?,
            },
            quality: QualityThresholds {
                min_bitrate_kbps: env_or("REELFIT_MIN_BITRATE_KBPS", defaults.quality.min_bitrate_kbps)?,
                ..defaults.quality
            },
            download_retries: env_or("REELFIT_DOWNLOAD_RETRIES", defaults.download_retries)?,
            search_page_size: env_or("REELFIT_SEARCH_PAGE_SIZE", defaults.search_page_size)?,
            search_max_pages: env_or("REELFIT_SEARCH_MAX_PAGES", defaults.search_max_pages)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler or pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_workers == 0 {
            return Err(WorkerError::config_error("max_workers must be at least 1"));
        }
        if self.normalize_parallelism == 0 {
            return Err(WorkerError::config_error("normalize_parallelism must be at least 1"));
        }
        let ratio = self.selection.insufficiency_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(WorkerError::config_error(format!(
                "insufficiency_ratio must be within 0..=1, got {ratio}"
            )));
        }
        if self.selection.widened_min_floor > self.selection.widened_max_ceiling {
            return Err(WorkerError::config_error("widened clip range floor exceeds ceiling"));
        }
        Ok(())
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_duration_policy(mut self, policy: DurationPolicy) -> Self {
        self.duration_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.timeouts.normalize_secs, 300);
        assert_eq!(config.timeouts.concat_secs, 600);
        assert_eq!(config.selection.insufficiency_ratio, 0.8);
        assert_eq!(config.selection.long_form_threshold, 600.0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = WorkerConfig::default().with_max_workers(0);
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    fn test_env_or_parses_and_rejects() {
        std::env::set_var("REELFIT_TEST_ENV_OR_OK", " 7 ");
        assert_eq!(env_or("REELFIT_TEST_ENV_OR_OK", 1usize).unwrap(), 7);

        std::env::set_var("REELFIT_TEST_ENV_OR_BAD", "seven");
        assert!(env_or("REELFIT_TEST_ENV_OR_BAD", 1usize).is_err());

        assert_eq!(env_or("REELFIT_TEST_ENV_OR_UNSET", 3u32).unwrap(), 3);
    }
}
