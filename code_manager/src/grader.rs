//! Runs grading units against the store and a sandbox.
//!
//! A [`Grader`] owns every status change a submission goes through once it
//! has been queued, and is the only place that decides whether a failed
//! step is retried or ends the submission in `error`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use code_runner::{ExecutionError, Executor, GradingFiles, Sandbox};
use db::models::{
    AgTestCase, AgTestSuite, Project, StudentTestSuite, Submission, SubmissionStatus,
    TestCaseResult,
};
use db::{ClaimOutcome, GradingStore, StoreError};
use util::paths::StorageLayout;

use crate::error::{GradingError, GradingResult};
use crate::manager::queue::{GradingUnit, SuiteRef};
use crate::retry::{RetryPolicy, whole_millis};

/// How a unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Done; the follow-up units (deferred suites) still need queueing.
    Completed(Vec<GradingUnit>),
    /// The submission was removed from the queue before or while grading.
    Cancelled,
    /// There was nothing to do.
    Skipped,
    /// The failure has already been recorded on the submission or task.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuiteRun {
    Completed,
    Cancelled,
}

enum LoadedSuite {
    Ag(AgTestSuite),
    Student(StudentTestSuite),
}

pub struct Grader {
    store: Arc<dyn GradingStore>,
    executor: Executor,
    layout: StorageLayout,
    retry: RetryPolicy,
    /// Deferred suites still outstanding per submission.
    deferred_remaining: Mutex<HashMap<i64, usize>>,
}

impl Grader {
    pub fn new(
        store: Arc<dyn GradingStore>,
        executor: Executor,
        layout: StorageLayout,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            executor,
            layout,
            retry,
            deferred_remaining: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn GradingStore> {
        &self.store
    }

    pub async fn run_unit(&self, sandbox: &mut dyn Sandbox, unit: &GradingUnit) -> UnitOutcome {
        match unit {
            GradingUnit::GradeSubmission { submission_id } => {
                self.grade_submission(sandbox, *submission_id).await
            }
            GradingUnit::DeferredSuite {
                submission_id,
                suite,
            } => self.grade_deferred_suite(sandbox, *submission_id, *suite).await,
            GradingUnit::Rerun {
                task_id,
                submission_id,
                suite,
                case_ids,
            } => {
                self.rerun_suite(sandbox, *task_id, *submission_id, *suite, case_ids)
                    .await
            }
        }
    }

    // --- primary grade ---

    /// Claims a queued submission and runs its non-deferred suites.
    pub async fn grade_submission(
        &self,
        sandbox: &mut dyn Sandbox,
        submission_id: i64,
    ) -> UnitOutcome {
        let submission = match self.store.claim_for_grading(submission_id).await {
            Ok(ClaimOutcome::Claimed(submission)) => submission,
            Ok(ClaimOutcome::RemovedFromQueue) => {
                tracing::info!(submission_id, "submission was removed from the queue before grading");
                return UnitOutcome::Cancelled;
            }
            Ok(ClaimOutcome::NotQueued(status)) => {
                tracing::debug!(submission_id, %status, "submission is not queued, skipping");
                return UnitOutcome::Skipped;
            }
            Err(err) => {
                tracing::error!(submission_id, error = %err, "could not claim submission");
                return UnitOutcome::Failed;
            }
        };

        tracing::info!(submission_id, "grading submission");
        match self.grade_claimed(sandbox, &submission).await {
            Ok(outcome) => outcome,
            Err(err) => self.fail_submission(submission_id, &err).await,
        }
    }

    async fn grade_claimed(
        &self,
        sandbox: &mut dyn Sandbox,
        submission: &Submission,
    ) -> GradingResult<UnitOutcome> {
        let submission_id = submission.id;
        let (project, files) = self.load_inputs(submission).await?;
        let ag_suites = self.store.ag_test_suites(project.id).await?;
        let student_suites = self.store.student_test_suites(project.id).await?;

        for suite in ag_suites.iter().filter(|s| !s.deferred) {
            let run = self
                .run_ag_suite(sandbox, suite, &[], &files, submission_id, true)
                .await?;
            if run == SuiteRun::Cancelled {
                return Ok(UnitOutcome::Cancelled);
            }
        }
        for suite in student_suites.iter().filter(|s| !s.deferred) {
            if self.removed_from_queue(submission_id).await? {
                return Ok(UnitOutcome::Cancelled);
            }
            self.run_student_suite(sandbox, suite, &files, submission_id)
                .await?;
        }

        let deferred: Vec<GradingUnit> = ag_suites
            .iter()
            .filter(|s| s.deferred)
            .map(|s| SuiteRef::Ag(s.id))
            .chain(
                student_suites
                    .iter()
                    .filter(|s| s.deferred)
                    .map(|s| SuiteRef::Student(s.id)),
            )
            .map(|suite| GradingUnit::DeferredSuite {
                submission_id,
                suite,
            })
            .collect();

        if self.removed_from_queue(submission_id).await? {
            return Ok(UnitOutcome::Cancelled);
        }
        if deferred.is_empty() {
            self.store
                .transition_status(submission_id, SubmissionStatus::FinishedGrading)
                .await?;
            tracing::info!(submission_id, "finished grading");
            return Ok(UnitOutcome::Completed(Vec::new()));
        }

        self.store
            .transition_status(submission_id, SubmissionStatus::WaitingForDeferred)
            .await?;
        self.deferred().insert(submission_id, deferred.len());
        tracing::info!(
            submission_id,
            deferred = deferred.len(),
            "primary grade done, waiting for deferred suites"
        );
        Ok(UnitOutcome::Completed(deferred))
    }

    // --- deferred suites ---

    async fn grade_deferred_suite(
        &self,
        sandbox: &mut dyn Sandbox,
        submission_id: i64,
        suite: SuiteRef,
    ) -> UnitOutcome {
        match self.grade_deferred_inner(sandbox, submission_id, suite).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.deferred().remove(&submission_id);
                self.fail_submission(submission_id, &err).await
            }
        }
    }

    async fn grade_deferred_inner(
        &self,
        sandbox: &mut dyn Sandbox,
        submission_id: i64,
        suite: SuiteRef,
    ) -> GradingResult<UnitOutcome> {
        let submission = self.store.submission(submission_id).await?;
        if submission.status != SubmissionStatus::WaitingForDeferred {
            tracing::debug!(
                submission_id,
                suite_id = suite.id(),
                status = %submission.status,
                "submission is no longer waiting for deferred suites, skipping"
            );
            return Ok(UnitOutcome::Skipped);
        }

        let (_, files) = self.load_inputs(&submission).await?;
        if self
            .run_suite_if_present(sandbox, suite, &[], &files, submission_id)
            .await?
        {
            tracing::info!(submission_id, suite_id = suite.id(), "deferred suite graded");
        }

        if self.finish_one_deferred(submission_id) {
            self.store
                .transition_status(submission_id, SubmissionStatus::FinishedGrading)
                .await?;
            tracing::info!(submission_id, "finished grading");
        }
        Ok(UnitOutcome::Completed(Vec::new()))
    }

    /// Counts one deferred suite as done; true when it was the last one.
    fn finish_one_deferred(&self, submission_id: i64) -> bool {
        let mut remaining = self.deferred();
        match remaining.get_mut(&submission_id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    remaining.remove(&submission_id);
                    true
                } else {
                    false
                }
            }
            // No record of the primary grade in this process (e.g. restored
            // from a snapshot); the suite that shows up finishes it.
            None => true,
        }
    }

    fn deferred(&self) -> MutexGuard<'_, HashMap<i64, usize>> {
        self.deferred_remaining
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- reruns ---

    async fn rerun_suite(
        &self,
        sandbox: &mut dyn Sandbox,
        task_id: i64,
        submission_id: i64,
        suite: SuiteRef,
        case_ids: &[i64],
    ) -> UnitOutcome {
        match self.store.rerun_task(task_id).await {
            Ok(task) if task.is_cancelled => {
                tracing::debug!(task_id, submission_id, "rerun task cancelled, dropping unit");
                return UnitOutcome::Skipped;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(task_id, error = %err, "could not load rerun task");
                return UnitOutcome::Failed;
            }
        }

        match self.rerun_inner(sandbox, submission_id, suite, case_ids).await {
            Ok(()) => {
                if let Err(err) = self.store.increment_rerun_progress(task_id).await {
                    tracing::error!(task_id, error = %err, "could not record rerun progress");
                }
                UnitOutcome::Completed(Vec::new())
            }
            Err(err) => {
                tracing::warn!(
                    task_id,
                    submission_id,
                    suite_id = suite.id(),
                    error = %err,
                    "rerun unit failed"
                );
                let message = format!(
                    "Error rerunning {} suite {} for submission {}\n{}\n",
                    suite.kind(),
                    suite.id(),
                    submission_id,
                    err
                );
                if let Err(err) = self.store.append_rerun_error(task_id, &message).await {
                    tracing::error!(task_id, error = %err, "could not record rerun error");
                }
                UnitOutcome::Failed
            }
        }
    }

    async fn rerun_inner(
        &self,
        sandbox: &mut dyn Sandbox,
        submission_id: i64,
        suite: SuiteRef,
        case_ids: &[i64],
    ) -> GradingResult<()> {
        let submission = self.store.submission(submission_id).await?;
        let (_, files) = self.load_inputs(&submission).await?;
        self.run_suite_if_present(sandbox, suite, case_ids, &files, submission_id)
            .await?;
        Ok(())
    }

    // --- suites ---

    /// Runs a suite outside the primary grade. A suite deleted since the
    /// unit was queued is skipped and reported as `false`.
    async fn run_suite_if_present(
        &self,
        sandbox: &mut dyn Sandbox,
        suite: SuiteRef,
        case_ids: &[i64],
        files: &GradingFiles,
        submission_id: i64,
    ) -> GradingResult<bool> {
        let found = match suite {
            SuiteRef::Ag(id) => self.store.ag_test_suite(id).await.map(LoadedSuite::Ag),
            SuiteRef::Student(id) => self.store.student_test_suite(id).await.map(LoadedSuite::Student),
        };
        match found {
            Ok(LoadedSuite::Ag(suite)) => {
                self.run_ag_suite(sandbox, &suite, case_ids, files, submission_id, false)
                    .await?;
            }
            Ok(LoadedSuite::Student(suite)) => {
                self.run_student_suite(sandbox, &suite, files, submission_id)
                    .await?;
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!(submission_id, suite_id = suite.id(), "suite was deleted, skipping");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }
        Ok(true)
    }

    /// Runs the selected cases of `suite` in order, saving each result.
    /// With `checkpoints` set the submission's status is checked before
    /// every case and a removal stops the suite.
    async fn run_ag_suite(
        &self,
        sandbox: &mut dyn Sandbox,
        suite: &AgTestSuite,
        case_ids: &[i64],
        files: &GradingFiles,
        submission_id: i64,
        checkpoints: bool,
    ) -> GradingResult<SuiteRun> {
        for case in suite.select_cases(case_ids) {
            if checkpoints && self.removed_from_queue(submission_id).await? {
                return Ok(SuiteRun::Cancelled);
            }
            let result = self.run_case(sandbox, case, files, submission_id).await?;
            self.store.save_test_case_result(result).await?;
        }
        tracing::debug!(submission_id, suite_id = suite.id, "graded suite {}", suite.name);
        Ok(SuiteRun::Completed)
    }

    async fn run_case(
        &self,
        sandbox: &mut dyn Sandbox,
        case: &AgTestCase,
        files: &GradingFiles,
        submission_id: i64,
    ) -> GradingResult<TestCaseResult> {
        let mut retry = 0;
        loop {
            match self
                .executor
                .run_test_case(sandbox, case, files, submission_id)
                .await
            {
                Ok(result) => return Ok(result),
                Err(err) => {
                    self.recover(sandbox, &mut retry, err, submission_id)
                        .await?
                }
            }
        }
    }

    async fn run_student_suite(
        &self,
        sandbox: &mut dyn Sandbox,
        suite: &StudentTestSuite,
        files: &GradingFiles,
        submission_id: i64,
    ) -> GradingResult<()> {
        let mut retry = 0;
        let result = loop {
            match self
                .executor
                .evaluate_student_suite(sandbox, suite, files, submission_id)
                .await
            {
                Ok(result) => break result,
                Err(err) => {
                    self.recover(sandbox, &mut retry, err, submission_id)
                        .await?
                }
            }
        };
        self.store.save_student_suite_result(result).await?;
        Ok(())
    }

    /// Decides what happens after a failed attempt. Returns `Ok` once the
    /// sandbox has been reset and the backoff has elapsed, or the error that
    /// ends the step.
    async fn recover(
        &self,
        sandbox: &mut dyn Sandbox,
        retry: &mut u32,
        err: ExecutionError,
        submission_id: i64,
    ) -> GradingResult<()> {
        if !err.is_transient() {
            return Err(err.into());
        }
        if !self.retry.allows(*retry + 1) {
            return Err(GradingError::RetriesExhausted {
                attempts: *retry + 1,
                source: err,
            });
        }
        *retry += 1;
        let delay = self.retry.next_delay(*retry);
        let delay_ms = whole_millis(delay);
        tracing::warn!(
            submission_id,
            attempt = *retry,
            delay_ms,
            error = %err,
            "sandbox failure, retrying"
        );
        if let Err(reset_err) = sandbox.reset().await {
            tracing::warn!(submission_id, error = %reset_err, "sandbox reset before retry failed");
        }
        tokio::time::sleep(delay).await;
        Ok(())
    }

    // --- helpers ---

    async fn load_inputs(&self, submission: &Submission) -> GradingResult<(Project, GradingFiles)> {
        let group = self.store.group(submission.group_id).await?;
        let project = self.store.project(group.project_id).await?;
        let files = GradingFiles::for_submission(&self.layout, &project, submission);
        Ok((project, files))
    }

    async fn removed_from_queue(&self, submission_id: i64) -> GradingResult<bool> {
        let removed =
            self.store.submission(submission_id).await?.status == SubmissionStatus::RemovedFromQueue;
        if removed {
            tracing::info!(submission_id, "submission removed from the queue, stopping");
        }
        Ok(removed)
    }

    /// Records `err` on the submission, unless it was cancelled meanwhile.
    async fn fail_submission(&self, submission_id: i64, err: &GradingError) -> UnitOutcome {
        if let Ok(submission) = self.store.submission(submission_id).await {
            if submission.status == SubmissionStatus::RemovedFromQueue {
                tracing::info!(submission_id, "submission removed from the queue while grading");
                return UnitOutcome::Cancelled;
            }
        }
        tracing::error!(submission_id, error = %err, "grading failed");
        if let Err(store_err) = self.store.mark_error(submission_id, err.user_message()).await {
            tracing::error!(submission_id, error = %store_err, "could not mark submission as errored");
        }
        UnitOutcome::Failed
    }
}
