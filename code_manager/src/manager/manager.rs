// manager/manager.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use code_runner::{Executor, SandboxFactory};
use db::models::{Submission, SubmissionStatus};
use db::{GradingStore, StoreError};
use util::config::AppConfig;
use util::paths::StorageLayout;

use crate::error::GradingResult;
use crate::grader::{Grader, UnitOutcome};
use crate::manager::queue::{GradingUnit, WorkQueue};
use crate::rerun::RerunCoordinator;
use crate::retry::RetryPolicy;

/// Pause before a worker looks at the queue again after handing back a
/// unit whose submission is busy elsewhere.
const REQUEUE_BACKOFF: Duration = Duration::from_millis(25);
const IDLE_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub num_workers: usize,
    pub queue_interval: Duration,
    pub retry: RetryPolicy,
    pub layout: StorageLayout,
    pub max_output_length: usize,
}

impl ManagerSettings {
    pub fn from_config() -> Self {
        let cfg = AppConfig::global();
        Self {
            num_workers: cfg.num_workers,
            queue_interval: cfg.queue_interval(),
            retry: RetryPolicy::new(cfg.max_retries, cfg.min_retry_delay(), cfg.max_retry_delay()),
            layout: StorageLayout::from_config(),
            max_output_length: cfg.max_output_length,
        }
    }
}

struct Shared {
    grader: Grader,
    sandboxes: Arc<dyn SandboxFactory>,
    queue: Arc<WorkQueue>,
    /// Submissions a worker is currently busy with.
    in_flight: Mutex<HashSet<i64>>,
    settings: ManagerSettings,
    shutdown: CancellationToken,
}

impl Shared {
    fn try_begin(&self, submission_id: i64) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(submission_id)
    }

    fn finish(&self, submission_id: i64) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&submission_id);
    }
}

/// A fixed pool of workers pulling grading units off one queue, plus the
/// periodic sweep that feeds newly received submissions into it.
///
/// Each worker owns one sandbox and runs one unit at a time. No two workers
/// ever hold units for the same submission at once.
#[derive(Clone)]
pub struct GradingManager {
    shared: Arc<Shared>,
}

impl GradingManager {
    pub fn new(
        store: Arc<dyn GradingStore>,
        sandboxes: Arc<dyn SandboxFactory>,
        settings: ManagerSettings,
    ) -> Self {
        let grader = Grader::new(
            store,
            Executor::new(settings.max_output_length),
            settings.layout.clone(),
            settings.retry,
        );
        Self {
            shared: Arc::new(Shared {
                grader,
                sandboxes,
                queue: Arc::new(WorkQueue::new()),
                in_flight: Mutex::new(HashSet::new()),
                settings,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn store(&self) -> Arc<dyn GradingStore> {
        Arc::clone(self.shared.grader.store())
    }

    pub fn queue(&self) -> Arc<WorkQueue> {
        Arc::clone(&self.shared.queue)
    }

    pub fn rerun_coordinator(&self) -> RerunCoordinator {
        RerunCoordinator::new(self.store(), self.queue())
    }

    /// Spawns the workers and the queue sweep. Everything stops once
    /// [`GradingManager::shutdown`] is called; a unit already running is
    /// finished first.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<JoinHandle<()>> = (0..self.shared.settings.num_workers.max(1))
            .map(|worker| tokio::spawn(worker_loop(Arc::clone(&self.shared), worker)))
            .collect();
        handles.push(tokio::spawn(sweep_loop(Arc::clone(&self.shared))));
        tracing::info!(
            workers = self.shared.settings.num_workers.max(1),
            interval_secs = self.shared.settings.queue_interval.as_secs(),
            "grading manager started"
        );
        handles
    }

    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    /// Moves every `received` submission, oldest first, to `queued` and
    /// queues a grading unit for it. Returns how many were queued.
    pub async fn queue_submissions(&self) -> GradingResult<usize> {
        queue_submissions(&self.shared).await
    }

    /// External cancellation. Workers notice at their next checkpoint.
    pub async fn remove_from_queue(&self, submission_id: i64) -> GradingResult<Submission> {
        let current = self.store().submission(submission_id).await?;
        if !current.status.is_active() {
            return Err(StoreError::UnexpectedStatus {
                submission_id,
                status: current.status,
                expected: "received, queued, being_graded".into(),
            }
            .into());
        }
        let submission = self
            .store()
            .transition_status(submission_id, SubmissionStatus::RemovedFromQueue)
            .await?;
        tracing::info!(submission_id, "submission removed from the queue");
        Ok(submission)
    }

    /// Resolves once nothing is queued or running.
    pub async fn wait_until_idle(&self) {
        while !self.shared.queue.is_idle() {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }
}

async fn queue_submissions(shared: &Shared) -> GradingResult<usize> {
    let store = shared.grader.store();
    let received = store
        .submissions_with_status(SubmissionStatus::Received)
        .await?;

    let mut queued = 0;
    for submission in received {
        match store
            .transition_status(submission.id, SubmissionStatus::Queued)
            .await
        {
            Ok(_) => {
                shared
                    .queue
                    .push(GradingUnit::GradeSubmission {
                        submission_id: submission.id,
                    })
                    .await;
                queued += 1;
            }
            // Removed between the listing and the transition.
            Err(StoreError::IllegalTransition(err)) => {
                tracing::debug!(submission_id = submission.id, %err, "submission left received, not queueing");
            }
            Err(err) => return Err(err.into()),
        }
    }
    if queued > 0 {
        tracing::info!(queued, "queued received submissions");
    }
    Ok(queued)
}

async fn sweep_loop(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(shared.settings.queue_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(err) = queue_submissions(&shared).await {
                    tracing::error!(error = %err, "queue sweep failed");
                }
            }
        }
    }
    tracing::debug!("queue sweep stopped");
}

async fn worker_loop(shared: Arc<Shared>, worker: usize) {
    let mut sandbox = shared.sandboxes.create(format!("grader-{worker}"));
    loop {
        let unit = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            unit = shared.queue.pop() => unit,
        };

        let submission_id = unit.submission_id();
        if !shared.try_begin(submission_id) {
            tracing::debug!(worker, submission_id, "submission busy on another worker, requeueing");
            shared.queue.push(unit).await;
            shared.queue.done();
            tokio::time::sleep(REQUEUE_BACKOFF).await;
            continue;
        }

        tracing::debug!(worker, submission_id, unit = ?unit, "starting unit");
        let outcome = shared.grader.run_unit(sandbox.as_mut(), &unit).await;
        if let UnitOutcome::Completed(follow_ups) = &outcome {
            shared.queue.extend(follow_ups.iter().cloned()).await;
        }
        tracing::debug!(worker, submission_id, outcome = ?outcome, "finished unit");

        shared.finish(submission_id);
        shared.queue.done();
    }
    tracing::debug!(worker, "worker stopped");
}
