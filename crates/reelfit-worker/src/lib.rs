//! Clip assembly worker.
//!
//! This crate provides:
//! - Clip selection and content analysis
//! - Duration fitting with configurable extension policies
//! - The per-job pipeline state machine with progress reporting
//! - A batch scheduler with a bounded worker pool
//! - Configuration, structured logging, metrics and retry helpers

pub mod acquire;
pub mod config;
pub mod error;
pub mod fitter;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod workspace;

pub use config::{SelectionPolicy, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use fitter::{DurationFitter, DurationPolicy};
pub use logging::JobLogger;
pub use manifest::BatchManifest;
pub use pipeline::{JobOutcome, PipelineOrchestrator};
pub use progress::{ChannelProgress, FnProgress, NoopProgress, ProgressEvent, ProgressSink, ProgressTracker};
pub use scheduler::{BatchScheduler, BatchSummary};
pub use selector::{analyze_content, ClipSelector, ContentAnalysis};
pub use store::JobStore;
pub use workspace::JobWorkspace;
