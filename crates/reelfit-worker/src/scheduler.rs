//! Batch scheduler.
//!
//! Jobs are queued with [`BatchScheduler::submit`] and drained by
//! [`BatchScheduler::run_all`], which runs at most `max_workers` pipelines
//! at a time. A failed job never affects its siblings.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use reelfit_models::{Job, JobId, JobStatus, JobStatusSnapshot, ModelError};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::{JobOutcome, PipelineOrchestrator};
use crate::progress::{ChannelProgress, NoopProgress, ProgressEvent, ProgressSink};
use crate::store::JobStore;

/// Counts for one `run_all` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Drained jobs that could not start and were not run
    pub skipped: usize,
}

/// Clears the running flag when a batch ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs queued jobs through a bounded pool of pipeline workers.
pub struct BatchScheduler {
    orchestrator: Arc<PipelineOrchestrator>,
    max_workers: usize,
    queue: Mutex<VecDeque<Job>>,
    store: JobStore,
    cancels: Mutex<HashMap<JobId, watch::Sender<bool>>>,
    outcomes: Arc<Mutex<HashMap<JobId, JobOutcome>>>,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
    running: AtomicBool,
}

impl BatchScheduler {
    pub fn new(orchestrator: PipelineOrchestrator) -> Self {
        let max_workers = orchestrator.config().max_workers.max(1);
        Self {
            orchestrator: Arc::new(orchestrator),
            max_workers,
            queue: Mutex::new(VecDeque::new()),
            store: JobStore::new(),
            cancels: Mutex::new(HashMap::new()),
            outcomes: Arc::new(Mutex::new(HashMap::new())),
            progress: None,
            running: AtomicBool::new(false),
        }
    }

    /// Forward every job's progress into `tx`.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queue a job. Only jobs that have not started can be submitted.
    pub async fn submit(&self, job: Job) -> WorkerResult<JobId> {
        if job.status != JobStatus::Queued {
            return Err(ModelError::IllegalTransition {
                from: job.status,
                to: JobStatus::Queued,
            }
            .into());
        }

        let id = job.id.clone();
        let (tx, _) = watch::channel(false);
        self.cancels.lock().await.insert(id.clone(), tx);
        self.store.insert(job.clone()).await;
        self.queue.lock().await.push_back(job);

        info!(job_id = %id, "Job queued");
        Ok(id)
    }

    /// Run every job queued so far and wait for all of them.
    ///
    /// Jobs submitted while a batch is running wait for the next call.
    pub async fn run_all(&self) -> WorkerResult<BatchSummary> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let jobs: Vec<Job> = self.queue.lock().await.drain(..).collect();
        if jobs.is_empty() {
            return Err(WorkerError::NoJobs);
        }

        let started = Instant::now();
        let total = jobs.len();
        info!(jobs = total, max_workers = self.max_workers, "Starting batch");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut workers = JoinSet::new();
        let mut task_jobs = HashMap::new();
        let mut skipped = 0;

        for job in jobs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::config_error("worker pool closed"))?;

            let marked = self.store.update(&job.id, |stored| Ok(stored.start()?)).await;
            match marked {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    warn!(job_id = %job.id, error = %e, "Skipping job that cannot start");
                    skipped += 1;
                    continue;
                }
                None => {
                    warn!(job_id = %job.id, "Skipping job removed before it started");
                    skipped += 1;
                    continue;
                }
            }

            let cancel = match self.cancels.lock().await.get(&job.id) {
                Some(tx) => tx.subscribe(),
                None => watch::channel(false).1,
            };
            let sink: Box<dyn ProgressSink> = match &self.progress {
                Some(tx) => Box::new(ChannelProgress::new(job.id.clone(), tx.clone())),
                None => Box::new(NoopProgress),
            };
            let orchestrator = Arc::clone(&self.orchestrator);
            let store = self.store.clone();
            let outcomes = Arc::clone(&self.outcomes);
            let job_id = job.id.clone();

            let handle = workers.spawn(async move {
                let result = orchestrator.run(&job, sink.as_ref(), &cancel).await;
                finish_job(&store, &outcomes, &job.id, result).await;
                drop(permit);
                job.id
            });
            task_jobs.insert(handle.id(), job_id);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                let job_id = task_jobs.get(&e.id()).cloned();
                error!(job_id = ?job_id, error = %e, "Worker task aborted");
                if let Some(id) = job_id {
                    finish_job(
                        &self.store,
                        &self.outcomes,
                        &id,
                        Err(WorkerError::StageFailure {
                            stage: reelfit_models::PipelineStage::Failed,
                            message: format!("worker task aborted: {e}"),
                        }),
                    )
                    .await;
                }
            }
        }

        let mut summary = BatchSummary {
            total,
            skipped,
            ..Default::default()
        };
        for id in task_jobs.values() {
            match self.store.get(id).await.map(|job| job.status) {
                Some(JobStatus::Completed) => summary.completed += 1,
                Some(JobStatus::Failed) => summary.failed += 1,
                _ => {}
            }
        }

        info!(
            total = summary.total,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Batch finished"
        );
        Ok(summary)
    }

    pub async fn get_status(&self, id: &JobId) -> Option<JobStatusSnapshot> {
        self.store.snapshot(id).await
    }

    pub async fn get_all_statuses(&self) -> Vec<JobStatusSnapshot> {
        self.store.snapshots().await
    }

    /// Details of a completed job's output.
    pub async fn outcome(&self, id: &JobId) -> Option<JobOutcome> {
        self.outcomes.lock().await.get(id).cloned()
    }

    /// Drop every completed or failed job, returning how many were removed.
    pub async fn clear_completed(&self) -> usize {
        let cleared = self.store.clear_terminal().await;
        let mut cancels = self.cancels.lock().await;
        let mut outcomes = self.outcomes.lock().await;
        for id in &cleared {
            cancels.remove(id);
            outcomes.remove(id);
        }
        cleared.len()
    }

    /// Ask a job to stop at its next stage boundary.
    ///
    /// Returns false when the job is unknown or already finished.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let finished = match self.store.get(id).await {
            Some(job) => job.status.is_terminal(),
            None => return false,
        };
        if finished {
            return false;
        }
        match self.cancels.lock().await.get(id) {
            Some(tx) => {
                tx.send_replace(true);
                info!(job_id = %id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Ask every unfinished job to stop.
    pub async fn cancel_all(&self) -> usize {
        let ids: Vec<JobId> = self.cancels.lock().await.keys().cloned().collect();
        let mut cancelled = 0;
        for id in ids {
            if self.cancel(&id).await {
                cancelled += 1;
            }
        }
        cancelled
    }
}

/// Record a job's terminal state.
async fn finish_job(
    store: &JobStore,
    outcomes: &Mutex<HashMap<JobId, JobOutcome>>,
    id: &JobId,
    result: WorkerResult<JobOutcome>,
) {
    let error_kind = result.as_ref().err().map(|e| e.kind());
    let recorded = match result {
        Ok(outcome) => {
            let score = outcome.quality.as_ref().map(|q| q.overall_score);
            outcomes.lock().await.insert(id.clone(), outcome);
            store.update(id, |job| {
                job.complete(score)?;
                Ok(job.elapsed_seconds())
            })
            .await
        }
        Err(e) => {
            store
                .update(id, |job| {
                    job.fail(e.to_string())?;
                    Ok(job.elapsed_seconds())
                })
                .await
        }
    };

    match recorded {
        Some(Ok(elapsed)) => {
            let status = if error_kind.is_some() {
                JobStatus::Failed
            } else {
                JobStatus::Completed
            };
            metrics::record_job(status, error_kind, elapsed);
        }
        Some(Err(e)) => warn!(job_id = %id, error = %e, "Could not record job result"),
        None => warn!(job_id = %id, "Job removed before its result was recorded"),
    }
}
