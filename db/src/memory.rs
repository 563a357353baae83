use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AgTestSuite, Project, RerunSubmissionsTask, StudentSuiteResult, StudentTestSuite, Submission,
    SubmissionGroup, SubmissionStatus, TestCaseResult,
};
use crate::store::{ClaimOutcome, GradingStore};

/// Serializable image of a [`MemoryStore`], used to load work into the
/// grader and to write results back out.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub projects: Vec<Project>,
    pub groups: Vec<SubmissionGroup>,
    pub submissions: Vec<Submission>,
    pub ag_test_suites: Vec<AgTestSuite>,
    pub student_test_suites: Vec<StudentTestSuite>,
    pub test_case_results: Vec<TestCaseResult>,
    pub student_suite_results: Vec<StudentSuiteResult>,
    pub rerun_tasks: Vec<RerunSubmissionsTask>,
}

#[derive(Debug, Default)]
struct State {
    projects: BTreeMap<i64, Project>,
    groups: BTreeMap<i64, SubmissionGroup>,
    submissions: BTreeMap<i64, Submission>,
    ag_test_suites: Vec<AgTestSuite>,
    student_test_suites: Vec<StudentTestSuite>,
    // keyed by (test id, submission id)
    test_case_results: BTreeMap<(i64, i64), TestCaseResult>,
    student_suite_results: BTreeMap<(i64, i64), StudentSuiteResult>,
    rerun_tasks: BTreeMap<i64, RerunSubmissionsTask>,
}

impl State {
    fn submission_mut(&mut self, id: i64) -> StoreResult<&mut Submission> {
        self.submissions
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("submission", id))
    }

    fn rerun_task_mut(&mut self, id: i64) -> StoreResult<&mut RerunSubmissionsTask> {
        self.rerun_tasks
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("rerun task", id))
    }

    fn add_submission(&mut self, submission: Submission) {
        if let Some(group) = self.groups.get_mut(&submission.group_id) {
            if !group.submission_ids.contains(&submission.id) {
                group.submission_ids.push(submission.id);
            }
        }
        self.submissions.insert(submission.id, submission);
    }
}

/// A [`GradingStore`] held entirely in memory behind one async lock.
///
/// Every trait method takes the lock once, so compound operations such as
/// [`GradingStore::claim_for_grading`] are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut state = State::default();
        state.projects = snapshot.projects.into_iter().map(|p| (p.id, p)).collect();
        state.groups = snapshot.groups.into_iter().map(|g| (g.id, g)).collect();

        let mut submissions = snapshot.submissions;
        submissions.sort_by_key(|s| (s.timestamp, s.id));
        for submission in submissions {
            state.add_submission(submission);
        }

        state.ag_test_suites = snapshot.ag_test_suites;
        state.student_test_suites = snapshot.student_test_suites;
        state.test_case_results = snapshot
            .test_case_results
            .into_iter()
            .map(|r| ((r.test_case_id, r.submission_id), r))
            .collect();
        state.student_suite_results = snapshot
            .student_suite_results
            .into_iter()
            .map(|r| ((r.student_test_suite_id, r.submission_id), r))
            .collect();
        state.rerun_tasks = snapshot.rerun_tasks.into_iter().map(|t| (t.id, t)).collect();

        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        StoreSnapshot {
            projects: state.projects.values().cloned().collect(),
            groups: state.groups.values().cloned().collect(),
            submissions: state.submissions.values().cloned().collect(),
            ag_test_suites: state.ag_test_suites.clone(),
            student_test_suites: state.student_test_suites.clone(),
            test_case_results: state.test_case_results.values().cloned().collect(),
            student_suite_results: state.student_suite_results.values().cloned().collect(),
            rerun_tasks: state.rerun_tasks.values().cloned().collect(),
        }
    }

    pub async fn insert_project(&self, project: Project) {
        self.state.write().await.projects.insert(project.id, project);
    }

    pub async fn insert_group(&self, group: SubmissionGroup) {
        self.state.write().await.groups.insert(group.id, group);
    }

    /// Adds a submission and appends it to its group as the newest one.
    pub async fn insert_submission(&self, submission: Submission) {
        self.state.write().await.add_submission(submission);
    }

    pub async fn insert_ag_test_suite(&self, suite: AgTestSuite) {
        let mut state = self.state.write().await;
        state.ag_test_suites.retain(|s| s.id != suite.id);
        state.ag_test_suites.push(suite);
    }

    pub async fn insert_student_test_suite(&self, suite: StudentTestSuite) {
        let mut state = self.state.write().await;
        state.student_test_suites.retain(|s| s.id != suite.id);
        state.student_test_suites.push(suite);
    }

    /// Deletes a suite. Results already saved for its cases stay.
    pub async fn remove_ag_test_suite(&self, id: i64) {
        self.state.write().await.ag_test_suites.retain(|s| s.id != id);
    }
}

#[async_trait]
impl GradingStore for MemoryStore {
    async fn project(&self, id: i64) -> StoreResult<Project> {
        self.state
            .read()
            .await
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("project", id))
    }

    async fn group(&self, id: i64) -> StoreResult<SubmissionGroup> {
        self.state
            .read()
            .await
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("group", id))
    }

    async fn ag_test_suites(&self, project_id: i64) -> StoreResult<Vec<AgTestSuite>> {
        Ok(self
            .state
            .read()
            .await
            .ag_test_suites
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn ag_test_suite(&self, id: i64) -> StoreResult<AgTestSuite> {
        self.state
            .read()
            .await
            .ag_test_suites
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("ag test suite", id))
    }

    async fn student_test_suites(&self, project_id: i64) -> StoreResult<Vec<StudentTestSuite>> {
        Ok(self
            .state
            .read()
            .await
            .student_test_suites
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn student_test_suite(&self, id: i64) -> StoreResult<StudentTestSuite> {
        self.state
            .read()
            .await
            .student_test_suites
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("student test suite", id))
    }

    async fn submission(&self, id: i64) -> StoreResult<Submission> {
        self.state
            .read()
            .await
            .submissions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("submission", id))
    }

    async fn submissions_with_status(
        &self,
        status: SubmissionStatus,
    ) -> StoreResult<Vec<Submission>> {
        let state = self.state.read().await;
        let mut found: Vec<Submission> = state
            .submissions
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.timestamp, s.id));
        Ok(found)
    }

    async fn project_submissions(&self, project_id: i64) -> StoreResult<Vec<Submission>> {
        let state = self.state.read().await;
        let mut found: Vec<Submission> = state
            .submissions
            .values()
            .filter(|s| {
                state
                    .groups
                    .get(&s.group_id)
                    .is_some_and(|g| g.project_id == project_id)
            })
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.timestamp, s.id));
        Ok(found)
    }

    async fn transition_status(
        &self,
        submission_id: i64,
        next: SubmissionStatus,
    ) -> StoreResult<Submission> {
        let mut state = self.state.write().await;
        let submission = state.submission_mut(submission_id)?;
        submission.advance(next)?;
        Ok(submission.clone())
    }

    async fn claim_for_grading(&self, submission_id: i64) -> StoreResult<ClaimOutcome> {
        let mut state = self.state.write().await;
        let submission = state.submission_mut(submission_id)?;
        match submission.status {
            SubmissionStatus::Queued => {
                submission.advance(SubmissionStatus::BeingGraded)?;
                Ok(ClaimOutcome::Claimed(submission.clone()))
            }
            SubmissionStatus::RemovedFromQueue => Ok(ClaimOutcome::RemovedFromQueue),
            other => Ok(ClaimOutcome::NotQueued(other)),
        }
    }

    async fn mark_error(&self, submission_id: i64, reason: String) -> StoreResult<Submission> {
        let mut state = self.state.write().await;
        let submission = state.submission_mut(submission_id)?;
        submission.advance(SubmissionStatus::Error)?;
        submission.invalid_reason_or_error.push(reason);
        Ok(submission.clone())
    }

    async fn save_test_case_result(&self, result: TestCaseResult) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.submissions.contains_key(&result.submission_id) {
            return Err(StoreError::not_found("submission", result.submission_id));
        }
        state
            .test_case_results
            .insert((result.test_case_id, result.submission_id), result);
        Ok(())
    }

    async fn test_case_result(
        &self,
        test_case_id: i64,
        submission_id: i64,
    ) -> StoreResult<Option<TestCaseResult>> {
        Ok(self
            .state
            .read()
            .await
            .test_case_results
            .get(&(test_case_id, submission_id))
            .cloned())
    }

    async fn submission_test_case_results(
        &self,
        submission_id: i64,
    ) -> StoreResult<Vec<TestCaseResult>> {
        Ok(self
            .state
            .read()
            .await
            .test_case_results
            .values()
            .filter(|r| r.submission_id == submission_id)
            .cloned()
            .collect())
    }

    async fn save_student_suite_result(&self, result: StudentSuiteResult) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.submissions.contains_key(&result.submission_id) {
            return Err(StoreError::not_found("submission", result.submission_id));
        }
        state
            .student_suite_results
            .insert((result.student_test_suite_id, result.submission_id), result);
        Ok(())
    }

    async fn student_suite_result(
        &self,
        student_test_suite_id: i64,
        submission_id: i64,
    ) -> StoreResult<Option<StudentSuiteResult>> {
        Ok(self
            .state
            .read()
            .await
            .student_suite_results
            .get(&(student_test_suite_id, submission_id))
            .cloned())
    }

    async fn submission_student_suite_results(
        &self,
        submission_id: i64,
    ) -> StoreResult<Vec<StudentSuiteResult>> {
        Ok(self
            .state
            .read()
            .await
            .student_suite_results
            .values()
            .filter(|r| r.submission_id == submission_id)
            .cloned()
            .collect())
    }

    async fn create_rerun_task(
        &self,
        task: RerunSubmissionsTask,
    ) -> StoreResult<RerunSubmissionsTask> {
        let mut state = self.state.write().await;
        state.rerun_tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn rerun_task(&self, id: i64) -> StoreResult<RerunSubmissionsTask> {
        self.state
            .read()
            .await
            .rerun_tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("rerun task", id))
    }

    async fn increment_rerun_progress(&self, id: i64) -> StoreResult<RerunSubmissionsTask> {
        let mut state = self.state.write().await;
        let task = state.rerun_task_mut(id)?;
        task.num_completed_subtasks += 1;
        Ok(task.clone())
    }

    async fn append_rerun_error(&self, id: i64, message: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.rerun_task_mut(id)?.error_message.push_str(message);
        Ok(())
    }

    async fn cancel_rerun(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.rerun_task_mut(id)?.is_cancelled = true;
        Ok(())
    }
}
