//! Selection and fitting results.
//!
//! A [`ClipSelection`] is what the selector hands to acquisition: candidate
//! metadata only. A [`ClipPlan`] is the ordered list of local files, with
//! probed durations, that the media stages consume.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::clip::{CandidateClip, ClipId};

/// Candidates picked for one job, in output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipSelection {
    pub clips: Vec<CandidateClip>,

    /// Set when the estimated duration fell short of the sufficiency threshold
    pub insufficient_content: bool,

    /// Sum of reported candidate durations in seconds
    pub estimated_duration: f64,
}

impl ClipSelection {
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// One entry of a fitted plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlannedClip {
    pub id: ClipId,

    /// Local media file
    pub path: PathBuf,

    /// Probed duration in seconds
    pub duration: f64,
}

impl PlannedClip {
    pub fn new(id: impl Into<ClipId>, path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            duration,
        }
    }
}

/// Ordered clip sequence for one output video.
///
/// The same clip may appear more than once when duration fitting chose
/// to repeat it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClipPlan {
    pub entries: Vec<PlannedClip>,

    /// Carried over from selection: the aggregate may be below target
    pub insufficient_content: bool,
}

impl ClipPlan {
    pub fn new(entries: Vec<PlannedClip>, insufficient_content: bool) -> Self {
        Self {
            entries,
            insufficient_content,
        }
    }

    /// Sum of entry durations in seconds.
    pub fn aggregate_duration(&self) -> f64 {
        self.entries.iter().map(|e| e.duration).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct source clips referenced by the plan.
    pub fn unique_sources(&self) -> usize {
        self.entries.iter().map(|e| &e.id).collect::<HashSet<_>>().len()
    }

    /// Whether any source clip appears more than once.
    pub fn has_repeats(&self) -> bool {
        self.unique_sources() < self.entries.len()
    }
}
