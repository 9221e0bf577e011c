//! Model validation errors.

use thiserror::Error;

use crate::JobStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown aspect preference: {0}")]
    UnknownAspect(String),

    #[error("Invalid selection criteria: {0}")]
    InvalidCriteria(String),

    #[error("Invalid preset '{name}': {reason}")]
    InvalidPreset { name: String, reason: String },

    #[error("Illegal job status transition: {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
}

impl ModelError {
    pub fn invalid_criteria(msg: impl Into<String>) -> Self {
        Self::InvalidCriteria(msg.into())
    }

    pub fn invalid_preset(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPreset {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
