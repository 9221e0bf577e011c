//! Clip selection criteria.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};

/// Default minimum clip duration in seconds
pub const DEFAULT_MIN_CLIP_DURATION: f64 = 5.0;
/// Default maximum clip duration in seconds
pub const DEFAULT_MAX_CLIP_DURATION: f64 = 30.0;
/// Default upper bound on the number of selected clips
pub const DEFAULT_MAX_CLIP_COUNT: usize = 50;

/// Aspect ratio thresholds (width / height).
pub const HORIZONTAL_MIN_RATIO: f64 = 1.5;
pub const VERTICAL_MAX_RATIO: f64 = 0.75;
pub const SQUARE_MIN_RATIO: f64 = 0.8;
pub const SQUARE_MAX_RATIO: f64 = 1.2;

/// Requested orientation of the source footage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AspectPreference {
    /// Landscape footage (ratio >= 1.5)
    Horizontal,
    /// Portrait footage (ratio <= 0.75)
    Vertical,
    /// Roughly square footage (0.8 ..= 1.2)
    Square,
    /// No orientation filter
    #[default]
    Any,
}

impl AspectPreference {
    /// All known preferences.
    pub const ALL: [AspectPreference; 4] = [
        AspectPreference::Horizontal,
        AspectPreference::Vertical,
        AspectPreference::Square,
        AspectPreference::Any,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectPreference::Horizontal => "horizontal",
            AspectPreference::Vertical => "vertical",
            AspectPreference::Square => "square",
            AspectPreference::Any => "any",
        }
    }

    /// Whether a width/height ratio satisfies this preference.
    ///
    /// Clips with an unknown ratio only pass the `Any` filter.
    pub fn accepts(&self, ratio: Option<f64>) -> bool {
        match (self, ratio) {
            (AspectPreference::Any, _) => true,
            (_, None) => false,
            (AspectPreference::Horizontal, Some(r)) => r >= HORIZONTAL_MIN_RATIO,
            (AspectPreference::Vertical, Some(r)) => r <= VERTICAL_MAX_RATIO,
            (AspectPreference::Square, Some(r)) => (SQUARE_MIN_RATIO..=SQUARE_MAX_RATIO).contains(&r),
        }
    }
}

impl fmt::Display for AspectPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectPreference {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "horizontal" | "landscape" => Ok(AspectPreference::Horizontal),
            "vertical" | "portrait" => Ok(AspectPreference::Vertical),
            "square" => Ok(AspectPreference::Square),
            "any" | "" => Ok(AspectPreference::Any),
            other => Err(ModelError::UnknownAspect(other.to_string())),
        }
    }
}

/// Constraints applied when picking clips for one output video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectionCriteria {
    /// Desired output length in seconds
    pub target_duration: f64,

    /// Shortest acceptable clip in seconds
    #[serde(default = "default_min_clip_duration")]
    pub min_clip_duration: f64,

    /// Longest acceptable clip in seconds
    #[serde(default = "default_max_clip_duration")]
    pub max_clip_duration: f64,

    /// Orientation filter
    #[serde(default)]
    pub aspect: AspectPreference,

    /// Upper bound on the number of selected clips
    #[serde(default = "default_max_clip_count")]
    pub max_clip_count: usize,
}

fn default_min_clip_duration() -> f64 {
    DEFAULT_MIN_CLIP_DURATION
}
fn default_max_clip_duration() -> f64 {
    DEFAULT_MAX_CLIP_DURATION
}
fn default_max_clip_count() -> usize {
    DEFAULT_MAX_CLIP_COUNT
}

impl SelectionCriteria {
    /// Criteria with default clip bounds for the given target.
    pub fn new(target_duration: f64) -> Self {
        Self {
            target_duration,
            min_clip_duration: DEFAULT_MIN_CLIP_DURATION,
            max_clip_duration: DEFAULT_MAX_CLIP_DURATION,
            aspect: AspectPreference::Any,
            max_clip_count: DEFAULT_MAX_CLIP_COUNT,
        }
    }

    pub fn with_clip_range(mut self, min: f64, max: f64) -> Self {
        self.min_clip_duration = min;
        self.max_clip_duration = max;
        self
    }

    pub fn with_aspect(mut self, aspect: AspectPreference) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn with_max_clip_count(mut self, count: usize) -> Self {
        self.max_clip_count = count;
        self
    }

    /// Midpoint of the accepted clip duration range.
    pub fn midpoint_duration(&self) -> f64 {
        (self.min_clip_duration + self.max_clip_duration) / 2.0
    }

    /// Validate the criteria.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.target_duration.is_finite() || self.target_duration <= 0.0 {
            return Err(ModelError::invalid_criteria(format!(
                "target_duration must be positive, got {}",
                self.target_duration
            )));
        }
        if !self.min_clip_duration.is_finite() || self.min_clip_duration < 0.0 {
            return Err(ModelError::invalid_criteria(
                "min_clip_duration must be non-negative",
            ));
        }
        if !self.max_clip_duration.is_finite() || self.max_clip_duration < self.min_clip_duration {
            return Err(ModelError::invalid_criteria(format!(
                "max_clip_duration ({}) must be >= min_clip_duration ({})",
                self.max_clip_duration, self.min_clip_duration
            )));
        }
        if self.max_clip_count == 0 {
            return Err(ModelError::invalid_criteria("max_clip_count must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_from_str() {
        assert_eq!("vertical".parse::<AspectPreference>().unwrap(), AspectPreference::Vertical);
        assert_eq!("Landscape".parse::<AspectPreference>().unwrap(), AspectPreference::Horizontal);
        assert_eq!("".parse::<AspectPreference>().unwrap(), AspectPreference::Any);
        assert!("diagonal".parse::<AspectPreference>().is_err());

        for aspect in AspectPreference::ALL {
            assert_eq!(aspect.as_str().parse::<AspectPreference>().unwrap(), aspect);
        }
    }

    #[test]
    fn test_aspect_thresholds() {
        let h = AspectPreference::Horizontal;
        assert!(h.accepts(Some(16.0 / 9.0)));
        assert!(h.accepts(Some(1.5)));
        assert!(!h.accepts(Some(4.0 / 3.0)));

        let v = AspectPreference::Vertical;
        assert!(v.accepts(Some(9.0 / 16.0)));
        assert!(v.accepts(Some(0.75)));
        assert!(!v.accepts(Some(0.8)));

        let s = AspectPreference::Square;
        assert!(s.accepts(Some(1.0)));
        assert!(s.accepts(Some(0.8)));
        assert!(s.accepts(Some(1.2)));
        assert!(!s.accepts(Some(1.3)));

        assert!(AspectPreference::Any.accepts(None));
        assert!(!h.accepts(None));
    }

    #[test]
    fn test_criteria_defaults_from_json() {
        let criteria: SelectionCriteria =
            serde_json::from_str(r#"{"target_duration": 60.0, "aspect": "vertical"}"#).unwrap();
        assert_eq!(criteria.min_clip_duration, DEFAULT_MIN_CLIP_DURATION);
        assert_eq!(criteria.max_clip_duration, DEFAULT_MAX_CLIP_DURATION);
        assert_eq!(criteria.max_clip_count, DEFAULT_MAX_CLIP_COUNT);
        assert_eq!(criteria.aspect, AspectPreference::Vertical);
        assert!(criteria.validate().is_ok());
    }

    #[test]
    fn test_criteria_validation() {
        assert!(SelectionCriteria::new(0.0).validate().is_err());
        assert!(SelectionCriteria::new(30.0)
            .with_clip_range(20.0, 10.0)
            .validate()
            .is_err());
        assert!(SelectionCriteria::new(30.0)
            .with_max_clip_count(0)
            .validate()
            .is_err());
        assert_eq!(SelectionCriteria::new(30.0).with_clip_range(4.0, 10.0).midpoint_duration(), 7.0);
    }
}
