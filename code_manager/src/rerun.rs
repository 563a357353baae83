//! Bulk regrading.
//!
//! A [`RerunSubmissionsTask`] is fanned out into one
//! [`GradingUnit::Rerun`] per `(submission, suite)` pair. Every unit that
//! finishes bumps the task's completed counter; one that fails appends to
//! its error message instead. Reruns replace result rows but never touch a
//! submission's status.

use std::sync::Arc;

use db::models::RerunSubmissionsTask;
use db::{GradingStore, StoreError, ValidationError};

use crate::error::GradingResult;
use crate::manager::queue::{GradingUnit, SuiteRef, WorkQueue};

pub struct RerunCoordinator {
    store: Arc<dyn GradingStore>,
    queue: Arc<WorkQueue>,
}

impl RerunCoordinator {
    pub fn new(store: Arc<dyn GradingStore>, queue: Arc<WorkQueue>) -> Self {
        Self { store, queue }
    }

    /// Validates `task`, stores it with its subtask total and queues its
    /// units. Nothing is queued when validation fails.
    pub async fn start(&self, mut task: RerunSubmissionsTask) -> GradingResult<RerunSubmissionsTask> {
        let units = self.plan(&task).await?;
        task.num_total_subtasks = units.len();
        task.num_completed_subtasks = 0;
        let task = self.store.create_rerun_task(task).await?;

        tracing::info!(
            task_id = task.id,
            project_id = task.project_id,
            subtasks = units.len(),
            "starting rerun"
        );
        self.queue.extend(units).await;
        Ok(task)
    }

    /// The units `task` expands to: every selected submission times every
    /// selected suite, submissions oldest first, ag suites before student
    /// suites.
    pub async fn plan(&self, task: &RerunSubmissionsTask) -> GradingResult<Vec<GradingUnit>> {
        let submission_ids = self.submission_ids(task).await?;
        let ag_suites = self.ag_suites(task).await?;
        let student_suites = self.student_suite_ids(task).await?;

        let mut units = Vec::with_capacity(submission_ids.len() * (ag_suites.len() + student_suites.len()));
        for &submission_id in &submission_ids {
            for (suite_id, case_ids) in &ag_suites {
                units.push(GradingUnit::Rerun {
                    task_id: task.id,
                    submission_id,
                    suite: SuiteRef::Ag(*suite_id),
                    case_ids: case_ids.clone(),
                });
            }
            for &suite_id in &student_suites {
                units.push(GradingUnit::Rerun {
                    task_id: task.id,
                    submission_id,
                    suite: SuiteRef::Student(suite_id),
                    case_ids: Vec::new(),
                });
            }
        }
        Ok(units)
    }

    pub async fn cancel(&self, task_id: i64) -> GradingResult<()> {
        self.store.cancel_rerun(task_id).await?;
        tracing::info!(task_id, "rerun cancelled");
        Ok(())
    }

    /// Completion percentage of a stored task.
    pub async fn progress(&self, task_id: i64) -> GradingResult<f64> {
        Ok(self.store.rerun_task(task_id).await?.progress())
    }

    async fn submission_ids(&self, task: &RerunSubmissionsTask) -> GradingResult<Vec<i64>> {
        if task.rerun_all_submissions {
            let submissions = self.store.project_submissions(task.project_id).await?;
            return Ok(submissions.into_iter().map(|s| s.id).collect());
        }
        for &id in &task.submission_ids {
            let project_id = match self.store.submission(id).await {
                Ok(submission) => Some(self.store.group(submission.group_id).await?.project_id),
                Err(StoreError::NotFound { .. }) => None,
                Err(err) => return Err(err.into()),
            };
            if project_id != Some(task.project_id) {
                return Err(foreign("submission_ids", "submission", id, task.project_id).into());
            }
        }
        Ok(task.submission_ids.clone())
    }

    async fn ag_suites(&self, task: &RerunSubmissionsTask) -> GradingResult<Vec<(i64, Vec<i64>)>> {
        if task.rerun_all_ag_test_suites {
            let suites = self.store.ag_test_suites(task.project_id).await?;
            return Ok(suites.into_iter().map(|s| (s.id, Vec::new())).collect());
        }
        let mut selected = Vec::with_capacity(task.ag_test_suite_data.len());
        for (&suite_id, case_ids) in &task.ag_test_suite_data {
            let suite = match self.store.ag_test_suite(suite_id).await {
                Ok(suite) if suite.project_id == task.project_id => suite,
                Ok(_) | Err(StoreError::NotFound { .. }) => {
                    return Err(
                        foreign("ag_test_suite_data", "ag test suite", suite_id, task.project_id).into(),
                    );
                }
                Err(err) => return Err(err.into()),
            };
            if let Some(case_id) = case_ids
                .iter()
                .find(|id| !suite.test_cases.iter().any(|c| c.id == **id))
            {
                return Err(ValidationError::new(
                    "ag_test_suite_data",
                    format!("test case {case_id} does not belong to ag test suite {suite_id}"),
                )
                .into());
            }
            selected.push((suite_id, case_ids.clone()));
        }
        Ok(selected)
    }

    async fn student_suite_ids(&self, task: &RerunSubmissionsTask) -> GradingResult<Vec<i64>> {
        if task.rerun_all_student_test_suites {
            let suites = self.store.student_test_suites(task.project_id).await?;
            return Ok(suites.into_iter().map(|s| s.id).collect());
        }
        for &id in &task.student_suite_ids {
            match self.store.student_test_suite(id).await {
                Ok(suite) if suite.project_id == task.project_id => {}
                Ok(_) | Err(StoreError::NotFound { .. }) => {
                    return Err(
                        foreign("student_suite_ids", "student test suite", id, task.project_id).into(),
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(task.student_suite_ids.clone())
    }
}

fn foreign(field: &str, entity: &str, id: i64, project_id: i64) -> ValidationError {
    ValidationError::new(
        field,
        format!("{entity} {id} does not belong to project {project_id}"),
    )
}
