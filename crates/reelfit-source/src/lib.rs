//! Stock clip source providers.
//!
//! The pipeline only depends on the [`ClipSource`] trait; [`PexelsClient`]
//! is the production implementation.

pub mod config;
pub mod error;
pub mod pexels;
pub mod source;

pub use config::PexelsConfig;
pub use error::{SourceError, SourceResult};
pub use pexels::{best_video_file, PexelsClient, PexelsVideoFile};
pub use source::{search_pages, ClipSource};
