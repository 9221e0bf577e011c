//! Pipeline stages and their progress bands.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Total progress units reported for one pipeline run.
pub const PROGRESS_TOTAL: u32 = 100;

/// State of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Selecting,
    Fitting,
    Normalizing,
    Concatenating,
    Trimming,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Selecting => "selecting",
            PipelineStage::Fitting => "fitting",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::Concatenating => "concatenating",
            PipelineStage::Trimming => "trimming",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }

    /// Progress range `(start, end)` covered by the stage.
    ///
    /// `Failed` has no band of its own; progress stays where it stopped.
    pub fn progress_band(&self) -> (u32, u32) {
        match self {
            PipelineStage::Selecting => (0, 10),
            PipelineStage::Fitting => (10, 20),
            PipelineStage::Normalizing => (20, 70),
            PipelineStage::Concatenating => (70, 90),
            PipelineStage::Trimming => (90, 99),
            PipelineStage::Done => (PROGRESS_TOTAL, PROGRESS_TOTAL),
            PipelineStage::Failed => (0, 0),
        }
    }

    /// Progress value for `done` of `total` steps within the stage.
    pub fn progress_at(&self, done: usize, total: usize) -> u32 {
        let (start, end) = self.progress_band();
        if total == 0 {
            return start;
        }
        let fraction = done.min(total) as f64 / total as f64;
        start + ((end - start) as f64 * fraction).floor() as u32
    }

    /// The stage that follows on success.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Selecting => Some(PipelineStage::Fitting),
            PipelineStage::Fitting => Some(PipelineStage::Normalizing),
            PipelineStage::Normalizing => Some(PipelineStage::Concatenating),
            PipelineStage::Concatenating => Some(PipelineStage::Trimming),
            PipelineStage::Trimming => Some(PipelineStage::Done),
            PipelineStage::Done | PipelineStage::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = PipelineStage::Selecting;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited.len(), 6);
        assert_eq!(stage, PipelineStage::Done);
    }

    #[test]
    fn test_bands_are_contiguous_and_increasing() {
        let mut stage = PipelineStage::Selecting;
        while let Some(next) = stage.next() {
            let (_, end) = stage.progress_band();
            let (start, _) = next.progress_band();
            assert!(start >= end);
            stage = next;
        }
    }

    #[test]
    fn test_progress_within_stage() {
        let stage = PipelineStage::Normalizing;
        assert_eq!(stage.progress_at(0, 4), 20);
        assert_eq!(stage.progress_at(2, 4), 45);
        assert_eq!(stage.progress_at(4, 4), 70);
        assert_eq!(stage.progress_at(9, 4), 70);
        assert_eq!(stage.progress_at(0, 0), 20);
        assert!(PipelineStage::Trimming.progress_at(1, 1) < PROGRESS_TOTAL);
    }
}
