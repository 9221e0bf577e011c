//! Cutting the joined stream to the target duration.

use std::path::Path;
use tracing::info;

use crate::engine::TranscodeEngine;
use crate::error::MediaResult;
use crate::fs_utils::{ensure_parent_dir, move_file, remove_if_exists};

/// Result of the trim stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimOutcome {
    /// Duration of the written output in seconds
    pub duration: f64,
    /// Whether a cut was made (false means pass-through)
    pub trimmed: bool,
}

/// Write `input` to `output`, cut to `target` seconds when it is longer.
///
/// Input no longer than `target` is moved through unchanged; nothing is
/// ever padded. A failed cut leaves no file at `output`.
pub async fn trim_to_target(
    engine: &dyn TranscodeEngine,
    input: &Path,
    target: f64,
    output: &Path,
) -> MediaResult<TrimOutcome> {
    let duration = engine.probe(input).await?.duration;

    if duration > target {
        ensure_parent_dir(output).await?;
        if let Err(e) = engine.trim(input, target, output).await {
            remove_if_exists(output).await?;
            return Err(e);
        }
        info!(from = duration, to = target, "Trimmed to target duration");
        return Ok(TrimOutcome {
            duration: target,
            trimmed: true,
        });
    }

    move_file(input, output).await?;
    info!(duration, target, "Output within target, no trim needed");
    Ok(TrimOutcome {
        duration,
        trimmed: false,
    })
}
