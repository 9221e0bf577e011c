//! Clip selection and content analysis.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use reelfit_models::{AspectPreference, CandidateClip, ClipSelection, SelectionCriteria};

use crate::config::SelectionPolicy;
use crate::error::{WorkerError, WorkerResult};

/// Clips shorter than this count as "short" in content analysis
const SHORT_CLIP_SECS: f64 = 15.0;
/// Clips up to this length count as "medium"
const MEDIUM_CLIP_SECS: f64 = 45.0;
/// Share of the available footage that can comfortably be used
const RECOMMENDED_USAGE: f64 = 0.9;

/// Picks a deduplicated subset of candidates matching the criteria.
#[derive(Debug, Clone, Default)]
pub struct ClipSelector {
    policy: SelectionPolicy,
}

impl ClipSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Accepted clip duration range for `criteria`.
    ///
    /// Long targets widen the range so more footage qualifies. Widening
    /// never narrows the configured range.
    pub fn effective_range(&self, criteria: &SelectionCriteria) -> (f64, f64) {
        let (min, max) = (criteria.min_clip_duration, criteria.max_clip_duration);
        if criteria.target_duration <= self.policy.long_form_threshold {
            return (min, max);
        }

        let widened_min = (min - self.policy.widen_min_by).max(self.policy.widened_min_floor).min(min);
        let widened_max = (max + self.policy.widen_max_by).min(self.policy.widened_max_ceiling).max(max);
        (widened_min, widened_max)
    }

    /// Number of clips to keep for a target, given the average clip length.
    pub fn optimal_count(&self, criteria: &SelectionCriteria, average_duration: f64) -> usize {
        let estimated = if average_duration > 0.0 {
            (criteria.target_duration / average_duration).ceil() as usize
        } else {
            criteria.max_clip_count
        };

        (estimated + self.policy.count_buffer)
            .max(self.policy.min_clip_count)
            .min(criteria.max_clip_count)
    }

    /// Deduplicate and filter `candidates`, keeping first-seen order.
    pub fn filter<'a>(&self, candidates: &'a [CandidateClip], criteria: &SelectionCriteria) -> Vec<&'a CandidateClip> {
        let (min, max) = self.effective_range(criteria);
        let mut seen = HashSet::new();

        candidates
            .iter()
            .filter(|clip| seen.insert(clip.id.clone()))
            .filter(|clip| clip.duration >= min && clip.duration <= max)
            .filter(|clip| criteria.aspect.accepts(clip.aspect_ratio()))
            .collect()
    }

    /// Select clips for one output.
    ///
    /// Falling short of the target is flagged on the result, never an error;
    /// only an empty filtered set fails.
    pub fn select(&self, candidates: &[CandidateClip], criteria: &SelectionCriteria) -> WorkerResult<ClipSelection> {
        criteria.validate()?;

        let filtered = self.filter(candidates, criteria);
        if filtered.is_empty() {
            debug!(
                candidates = candidates.len(),
                aspect = %criteria.aspect,
                "No candidate passed the filters"
            );
            return Err(WorkerError::NoCandidates);
        }

        let durations: Vec<f64> = filtered.iter().map(|c| c.duration).filter(|d| *d > 0.0).collect();
        let average = if durations.is_empty() {
            criteria.midpoint_duration()
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let count = self.optimal_count(criteria, average);
        let clips: Vec<CandidateClip> = filtered.into_iter().take(count).cloned().collect();
        let estimated_duration: f64 = clips.iter().map(|c| c.duration).sum();
        let insufficient_content = estimated_duration < self.policy.insufficiency_ratio * criteria.target_duration;

        if insufficient_content {
            warn!(
                estimated = estimated_duration,
                target = criteria.target_duration,
                "Selected content is short of the target, clips will be repeated"
            );
        }
        info!(
            candidates = candidates.len(),
            selected = clips.len(),
            optimal = count,
            average,
            estimated = estimated_duration,
            "Selected clips"
        );

        Ok(ClipSelection {
            clips,
            insufficient_content,
            estimated_duration,
        })
    }
}

/// What a candidate pool can offer for a given orientation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub unique_clips: usize,
    /// Clips matching the orientation with a known duration
    pub filtered_clips: usize,
    pub total_duration: f64,
    pub filtered_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub average_duration: f64,
    pub short_clips: usize,
    pub medium_clips: usize,
    pub long_clips: usize,
    /// Longest target the pool supports without heavy repetition
    pub recommended_max_duration: f64,
}

/// Summarize `candidates` for the `aspect` orientation.
///
/// Only the orientation filter applies here; duration bounds are ignored so
/// the caller sees everything the pool could provide.
pub fn analyze_content(candidates: &[CandidateClip], aspect: AspectPreference) -> ContentAnalysis {
    let mut seen = HashSet::new();
    let unique: Vec<&CandidateClip> = candidates.iter().filter(|c| seen.insert(c.id.clone())).collect();
    let total_duration = unique.iter().map(|c| c.duration.max(0.0)).sum();

    let durations: Vec<f64> = unique
        .iter()
        .filter(|c| aspect.accepts(c.aspect_ratio()))
        .map(|c| c.duration)
        .filter(|d| *d > 0.0)
        .collect();

    let mut analysis = ContentAnalysis {
        unique_clips: unique.len(),
        filtered_clips: durations.len(),
        total_duration,
        ..Default::default()
    };
    if durations.is_empty() {
        return analysis;
    }

    analysis.filtered_duration = durations.iter().sum();
    analysis.min_duration = durations.iter().copied().fold(f64::INFINITY, f64::min);
    analysis.max_duration = durations.iter().copied().fold(0.0, f64::max);
    analysis.average_duration = analysis.filtered_duration / durations.len() as f64;
    analysis.short_clips = durations.iter().filter(|d| **d < SHORT_CLIP_SECS).count();
    analysis.medium_clips = durations
        .iter()
        .filter(|d| **d >= SHORT_CLIP_SECS && **d <= MEDIUM_CLIP_SECS)
        .count();
    analysis.long_clips = durations.iter().filter(|d| **d > MEDIUM_CLIP_SECS).count();
    analysis.recommended_max_duration = analysis.filtered_duration * RECOMMENDED_USAGE;
    analysis
}
