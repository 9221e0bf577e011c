//! Duration fitting.
//!
//! Guarantees the fitted plan's aggregate duration is at least the target
//! whenever one clip with a positive duration exists. Cutting down to the
//! exact target is left to the trim stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use reelfit_models::{ClipPlan, PlannedClip};

use crate::error::WorkerError;

/// Longest duration a clip contributes to its extension weight
pub const DEFAULT_WEIGHT_CAP_SECS: f64 = 10.0;
/// Clips shorter than this are not preferred for extension
pub const DEFAULT_EXTEND_MIN_CLIP_SECS: f64 = 3.0;

/// How to extend a plan that is shorter than the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DurationPolicy {
    /// Repeat the whole ordered sequence the minimal number of times.
    #[default]
    RepeatWhole,
    /// Append the longest (capped-weight) clips one at a time.
    WeightedExtend { weight_cap: f64, min_clip_duration: f64 },
}

impl DurationPolicy {
    pub fn weighted_extend() -> Self {
        DurationPolicy::WeightedExtend {
            weight_cap: DEFAULT_WEIGHT_CAP_SECS,
            min_clip_duration: DEFAULT_EXTEND_MIN_CLIP_SECS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationPolicy::RepeatWhole => "repeat_whole",
            DurationPolicy::WeightedExtend { .. } => "weighted_extend",
        }
    }
}

impl fmt::Display for DurationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DurationPolicy {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "repeat_whole" | "repeat" => Ok(DurationPolicy::RepeatWhole),
            "weighted_extend" | "weighted" => Ok(DurationPolicy::weighted_extend()),
            other => Err(WorkerError::config_error(format!("unknown duration policy '{other}'"))),
        }
    }
}

/// Extends clip sequences to cover a target duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationFitter {
    policy: DurationPolicy,
}

impl DurationFitter {
    pub fn new(policy: DurationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DurationPolicy {
        self.policy
    }

    /// Fit `clips` (in output order, with probed durations) to `target`.
    pub fn fit(&self, clips: Vec<PlannedClip>, target: f64, insufficient_content: bool) -> ClipPlan {
        let aggregate: f64 = clips.iter().map(|c| c.duration).sum();

        if aggregate >= target || !clips.iter().any(|c| c.duration > 0.0) {
            return ClipPlan::new(clips, insufficient_content);
        }

        let entries = match self.policy {
            DurationPolicy::RepeatWhole => repeat_whole(clips, aggregate, target),
            DurationPolicy::WeightedExtend {
                weight_cap,
                min_clip_duration,
            } => weighted_extend(clips, aggregate, target, weight_cap, min_clip_duration),
        };

        let plan = ClipPlan::new(entries, insufficient_content);
        debug!(
            policy = %self.policy,
            from = aggregate,
            to = plan.aggregate_duration(),
            target,
            entries = plan.len(),
            "Extended clip sequence"
        );
        plan
    }
}

fn repeat_whole(clips: Vec<PlannedClip>, aggregate: f64, target: f64) -> Vec<PlannedClip> {
    let repetitions = (target / aggregate).ceil() as usize;
    let mut entries = Vec::with_capacity(clips.len() * repetitions);
    for _ in 0..repetitions {
        entries.extend(clips.iter().cloned());
    }
    entries
}

fn weighted_extend(
    clips: Vec<PlannedClip>,
    aggregate: f64,
    target: f64,
    weight_cap: f64,
    min_clip_duration: f64,
) -> Vec<PlannedClip> {
    let mut eligible: Vec<&PlannedClip> = clips
        .iter()
        .filter(|c| c.duration >= min_clip_duration && c.duration > 0.0)
        .collect();
    if eligible.is_empty() {
        eligible = clips.iter().filter(|c| c.duration > 0.0).collect();
    }
    // Stable sort keeps plan order among equal weights
    eligible.sort_by(|a, b| {
        let wa = a.duration.min(weight_cap);
        let wb = b.duration.min(weight_cap);
        wb.total_cmp(&wa)
    });

    let mut extension = Vec::new();
    let mut total = aggregate;
    let mut pool = eligible.iter();

    while total < target {
        let clip = match pool.next() {
            Some(clip) => clip,
            None => {
                pool = eligible.iter();
                continue;
            }
        };
        extension.push((*clip).clone());
        total += clip.duration;
    }

    let mut entries = clips;
    entries.extend(extension);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clips(durations: &[f64]) -> Vec<PlannedClip> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| PlannedClip::new(format!("c{i}"), format!("/clips/c{i}.mp4"), *d))
            .collect()
    }

    #[test]
    fn test_sufficient_plan_passes_through() {
        let fitter = DurationFitter::new(DurationPolicy::RepeatWhole);
        let plan = fitter.fit(clips(&[10.0, 10.0, 10.0]), 25.0, false);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.aggregate_duration(), 30.0);
        assert!(!plan.has_repeats());
    }

    #[test]
    fn test_repeat_whole_two_repetitions() {
        let fitter = DurationFitter::new(DurationPolicy::RepeatWhole);
        let plan = fitter.fit(clips(&[10.0, 10.0, 10.0]), 45.0, false);
        assert_eq!(plan.len(), 6);
        assert_eq!(plan.aggregate_duration(), 60.0);
        let ids: Vec<_> = plan.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2", "c0", "c1", "c2"]);
    }

    #[test]
    fn test_repeat_whole_minimal_count() {
        let fitter = DurationFitter::new(DurationPolicy::RepeatWhole);
        // 7s aggregate, 21s target: exactly three passes
        let plan = fitter.fit(clips(&[4.0, 3.0]), 21.0, true);
        assert_eq!(plan.len(), 6);
        assert!(plan.insufficient_content);
    }

    #[test]
    fn test_weighted_extend_prefers_longest() {
        let fitter = DurationFitter::new(DurationPolicy::weighted_extend());
        let plan = fitter.fit(clips(&[4.0, 8.0, 2.0]), 20.0, false);

        assert!(plan.aggregate_duration() >= 20.0);
        // 14s + c1 (8s) = 22s
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.entries[3].id.as_str(), "c1");
    }

    #[test]
    fn test_weighted_extend_refills_pool() {
        let fitter = DurationFitter::new(DurationPolicy::weighted_extend());
        let plan = fitter.fit(clips(&[5.0, 4.0]), 40.0, false);
        assert!(plan.aggregate_duration() >= 40.0);
        let extension: Vec<_> = plan.entries[2..].iter().map(|e| e.id.as_str()).collect();
        assert_eq!(extension, vec!["c0", "c1", "c0", "c1", "c0", "c1", "c0"]);
    }

    #[test]
    fn test_weighted_extend_uses_short_clips_when_nothing_else() {
        let fitter = DurationFitter::new(DurationPolicy::weighted_extend());
        let plan = fitter.fit(clips(&[1.0, 2.0]), 10.0, false);
        assert!(plan.aggregate_duration() >= 10.0);
        assert_eq!(plan.entries[2].id.as_str(), "c1");
    }

    #[test]
    fn test_output_covers_target_for_any_policy() {
        for policy in [DurationPolicy::RepeatWhole, DurationPolicy::weighted_extend()] {
            let fitter = DurationFitter::new(policy);
            for target in [1.0, 9.5, 33.3, 120.0, 601.0] {
                let plan = fitter.fit(clips(&[3.2, 7.7, 0.0, 12.1]), target, false);
                assert!(plan.aggregate_duration() >= target, "{policy} {target}");
            }
        }
    }

    #[test]
    fn test_zero_duration_clips_pass_through() {
        let fitter = DurationFitter::new(DurationPolicy::RepeatWhole);
        let plan = fitter.fit(clips(&[0.0, 0.0]), 10.0, true);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("repeat_whole".parse::<DurationPolicy>().unwrap(), DurationPolicy::RepeatWhole);
        assert_eq!("weighted-extend".parse::<DurationPolicy>().unwrap(), DurationPolicy::weighted_extend());
        assert!("shuffle".parse::<DurationPolicy>().is_err());
    }
}
