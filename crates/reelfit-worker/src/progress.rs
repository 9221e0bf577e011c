//! Progress reporting.
//!
//! The pipeline reports `(current, total, stage)` with `total` fixed at
//! [`PROGRESS_TOTAL`]. Sinks are called from the worker task running the
//! job; whatever they forward to must handle its own synchronization.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::trace;

use reelfit_models::{JobId, PipelineStage, PROGRESS_TOTAL};

/// Receiver of pipeline progress.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, current: u32, total: u32, stage: &str);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _current: u32, _total: u32, _stage: &str) {}
}

/// Adapts a closure into a sink.
pub struct FnProgress<F>(pub F);

impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(u32, u32, &str) + Send + Sync,
{
    fn on_progress(&self, current: u32, total: u32, stage: &str) {
        (self.0)(current, total, stage)
    }
}

/// One progress update, tagged with its job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub current: u32,
    pub total: u32,
    pub stage: String,
}

/// Forwards progress into an unbounded channel.
///
/// A dropped receiver is not an error; updates are simply lost.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    job_id: JobId,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(job_id: JobId, tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { job_id, tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&self, current: u32, total: u32, stage: &str) {
        let _ = self.tx.send(ProgressEvent {
            job_id: self.job_id.clone(),
            current,
            total,
            stage: stage.to_string(),
        });
    }
}

/// Keeps reported progress monotonic over one pipeline run.
///
/// Values below the last reported one are raised to it, and only
/// [`ProgressTracker::finish`] reports the full total.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    last: AtomicU32,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last: AtomicU32::new(0),
        }
    }

    /// Report `done` of `total` steps within `stage`.
    pub fn report(&self, stage: PipelineStage, done: usize, total: usize) {
        let value = stage.progress_at(done, total).min(PROGRESS_TOTAL - 1);
        let current = self.last.fetch_max(value, Ordering::SeqCst).max(value);
        trace!(stage = %stage, current, "progress");
        self.sink.on_progress(current, PROGRESS_TOTAL, stage.as_str());
    }

    /// Report the start of `stage`.
    pub fn enter(&self, stage: PipelineStage) {
        self.report(stage, 0, 1);
    }

    /// Report completion.
    pub fn finish(&self) {
        self.last.store(PROGRESS_TOTAL, Ordering::SeqCst);
        self.sink
            .on_progress(PROGRESS_TOTAL, PROGRESS_TOTAL, PipelineStage::Done.as_str());
    }

    pub fn current(&self) -> u32 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(u32, u32, String)>>);

    impl ProgressSink for Recorder {
        fn on_progress(&self, current: u32, total: u32, stage: &str) {
            self.0.lock().unwrap().push((current, total, stage.to_string()));
        }
    }

    #[test]
    fn test_tracker_is_monotonic() {
        let recorder = Recorder::default();
        let tracker = ProgressTracker::new(&recorder);

        tracker.enter(PipelineStage::Selecting);
        tracker.report(PipelineStage::Normalizing, 1, 2);
        // A late report from an earlier band must not move progress back
        tracker.report(PipelineStage::Fitting, 1, 1);
        tracker.enter(PipelineStage::Trimming);
        tracker.finish();

        let events = recorder.0.lock().unwrap();
        let values: Vec<u32> = events.iter().map(|e| e.0).collect();
        assert_eq!(values, vec![0, 45, 45, 90, 100]);
        assert!(events.iter().all(|e| e.1 == PROGRESS_TOTAL));
        assert_eq!(events.last().unwrap().2, "done");
    }

    #[test]
    fn test_only_finish_reports_total() {
        let recorder = Recorder::default();
        let tracker = ProgressTracker::new(&recorder);
        tracker.report(PipelineStage::Done, 1, 1);
        assert_eq!(tracker.current(), PROGRESS_TOTAL - 1);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job_id = JobId::from_string("job-1");
        let sink = ChannelProgress::new(job_id.clone(), tx);

        sink.on_progress(20, 100, "normalizing");
        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id, job_id);
        assert_eq!(event.current, 20);
        assert_eq!(event.stage, "normalizing");

        drop(rx);
        sink.on_progress(30, 100, "normalizing");
    }

    #[test]
    fn test_fn_sink() {
        let seen = AtomicU32::new(0);
        let sink = FnProgress(|current: u32, _total: u32, _stage: &str| {
            seen.store(current, Ordering::SeqCst);
        });
        sink.on_progress(70, 100, "concatenating");
        assert_eq!(seen.load(Ordering::SeqCst), 70);
    }
}
