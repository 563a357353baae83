//! The persistence boundary of the grading pipeline.
//!
//! The relational store that owns these records lives outside this
//! workspace. Everything the scheduler, executors and feedback engine need
//! from it goes through [`GradingStore`]; [`crate::memory::MemoryStore`] is
//! the in-process implementation used by the binary and the tests.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{
    AgTestSuite, Project, RerunSubmissionsTask, StudentSuiteResult, StudentTestSuite, Submission,
    SubmissionGroup, SubmissionStatus, TestCaseResult,
};

/// Result of trying to take a queued submission for grading.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The caller now owns the submission, which is `being_graded`.
    Claimed(Submission),
    /// The submission was cancelled before a worker reached it.
    RemovedFromQueue,
    /// Someone else claimed it, or it is not waiting in the queue.
    NotQueued(SubmissionStatus),
}

#[async_trait]
pub trait GradingStore: Send + Sync {
    // --- specs (read-only during grading) ---

    async fn project(&self, id: i64) -> StoreResult<Project>;

    async fn group(&self, id: i64) -> StoreResult<SubmissionGroup>;

    /// Suites in display order.
    async fn ag_test_suites(&self, project_id: i64) -> StoreResult<Vec<AgTestSuite>>;

    async fn ag_test_suite(&self, id: i64) -> StoreResult<AgTestSuite>;

    async fn student_test_suites(&self, project_id: i64) -> StoreResult<Vec<StudentTestSuite>>;

    async fn student_test_suite(&self, id: i64) -> StoreResult<StudentTestSuite>;

    // --- submissions ---

    async fn submission(&self, id: i64) -> StoreResult<Submission>;

    /// Submissions currently in `status`, oldest first.
    async fn submissions_with_status(&self, status: SubmissionStatus)
    -> StoreResult<Vec<Submission>>;

    async fn project_submissions(&self, project_id: i64) -> StoreResult<Vec<Submission>>;

    /// Moves a submission to `next` if the state machine allows it.
    async fn transition_status(
        &self,
        submission_id: i64,
        next: SubmissionStatus,
    ) -> StoreResult<Submission>;

    /// Atomically moves `queued -> being_graded`. At most one caller can
    /// observe `Claimed` for a given submission.
    async fn claim_for_grading(&self, submission_id: i64) -> StoreResult<ClaimOutcome>;

    /// Moves a submission to `error` and records `reason`.
    async fn mark_error(&self, submission_id: i64, reason: String) -> StoreResult<Submission>;

    // --- results ---

    /// Stores `result` as the row for its `(test case, submission)` pair,
    /// replacing any earlier row for that pair.
    async fn save_test_case_result(&self, result: TestCaseResult) -> StoreResult<()>;

    async fn test_case_result(
        &self,
        test_case_id: i64,
        submission_id: i64,
    ) -> StoreResult<Option<TestCaseResult>>;

    async fn submission_test_case_results(
        &self,
        submission_id: i64,
    ) -> StoreResult<Vec<TestCaseResult>>;

    /// Same replacement rule as [`GradingStore::save_test_case_result`].
    async fn save_student_suite_result(&self, result: StudentSuiteResult) -> StoreResult<()>;

    async fn student_suite_result(
        &self,
        student_test_suite_id: i64,
        submission_id: i64,
    ) -> StoreResult<Option<StudentSuiteResult>>;

    async fn submission_student_suite_results(
        &self,
        submission_id: i64,
    ) -> StoreResult<Vec<StudentSuiteResult>>;

    // --- reruns ---

    async fn create_rerun_task(&self, task: RerunSubmissionsTask) -> StoreResult<RerunSubmissionsTask>;

    async fn rerun_task(&self, id: i64) -> StoreResult<RerunSubmissionsTask>;

    /// Atomic `num_completed_subtasks += 1`.
    async fn increment_rerun_progress(&self, id: i64) -> StoreResult<RerunSubmissionsTask>;

    async fn append_rerun_error(&self, id: i64, message: &str) -> StoreResult<()>;

    async fn cancel_rerun(&self, id: i64) -> StoreResult<()>;
}
