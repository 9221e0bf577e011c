//! Shared data models for the reelfit pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Candidate clips and selection criteria
//! - Clip selections and fitted clip plans
//! - Output presets
//! - Jobs, job status snapshots and pipeline stages

pub mod clip;
pub mod criteria;
pub mod error;
pub mod job;
pub mod job_status;
pub mod plan;
pub mod preset;
pub mod stage;

// Re-export common types
pub use clip::{CandidateClip, ClipId};
pub use criteria::{AspectPreference, SelectionCriteria};
pub use error::{ModelError, ModelResult};
pub use job::{Job, JobId, JobInputs};
pub use job_status::{JobStatus, JobStatusSnapshot};
pub use plan::{ClipPlan, ClipSelection, PlannedClip};
pub use preset::{PresetCatalog, PresetProfile, Resolution};
pub use stage::{PipelineStage, PROGRESS_TOTAL};
