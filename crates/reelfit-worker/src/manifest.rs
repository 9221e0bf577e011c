//! Batch manifest files read by the worker binary.

use serde::{Deserialize, Serialize};
use std::path::Path;

use reelfit_models::{Job, PresetCatalog, PresetProfile};

use crate::error::{WorkerError, WorkerResult};

/// A batch of jobs, plus presets to register beside the built-ins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    #[serde(default)]
    pub presets: Vec<PresetProfile>,
    pub jobs: Vec<Job>,
}

impl BatchManifest {
    pub fn from_json(raw: &str) -> WorkerResult<Self> {
        serde_json::from_str(raw).map_err(|e| WorkerError::config_error(format!("invalid batch manifest: {e}")))
    }

    pub async fn load(path: &Path) -> WorkerResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    /// The built-in catalog extended with this manifest's presets.
    pub fn catalog(&self) -> WorkerResult<PresetCatalog> {
        let mut catalog = PresetCatalog::builtin();
        for preset in &self.presets {
            catalog.register(preset.clone())?;
        }
        Ok(catalog)
    }
}
