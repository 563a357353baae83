use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bulk request to regrade submissions of one project.
///
/// Each `all` flag wins over its id list. In `ag_test_suite_data` an empty
/// case list means every case of that suite.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RerunSubmissionsTask {
    pub id: i64,
    pub project_id: i64,

    #[serde(default = "default_true")]
    pub rerun_all_submissions: bool,
    #[serde(default)]
    pub submission_ids: Vec<i64>,

    #[serde(default = "default_true")]
    pub rerun_all_ag_test_suites: bool,
    #[serde(default)]
    pub ag_test_suite_data: BTreeMap<i64, Vec<i64>>,

    #[serde(default = "default_true")]
    pub rerun_all_student_test_suites: bool,
    #[serde(default)]
    pub student_suite_ids: Vec<i64>,

    #[serde(default)]
    pub num_total_subtasks: usize,
    #[serde(default)]
    pub num_completed_subtasks: usize,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl RerunSubmissionsTask {
    /// A task that reruns everything in `project_id`.
    pub fn all(id: i64, project_id: i64) -> Self {
        Self {
            id,
            project_id,
            rerun_all_submissions: true,
            submission_ids: Vec::new(),
            rerun_all_ag_test_suites: true,
            ag_test_suite_data: BTreeMap::new(),
            rerun_all_student_test_suites: true,
            student_suite_ids: Vec::new(),
            num_total_subtasks: 0,
            num_completed_subtasks: 0,
            error_message: String::new(),
            is_cancelled: false,
            created_at: Utc::now(),
        }
    }

    /// Completion percentage in `[0, 100]`; a task with nothing to do is done.
    pub fn progress(&self) -> f64 {
        if self.num_total_subtasks == 0 {
            return 100.0;
        }
        let pct = self.num_completed_subtasks as f64 / self.num_total_subtasks as f64 * 100.0;
        pct.min(100.0)
    }

    /// Case ids to rerun for `suite_id`; empty means all of them.
    pub fn case_ids_for(&self, suite_id: i64) -> &[i64] {
        if self.rerun_all_ag_test_suites {
            return &[];
        }
        self.ag_test_suite_data
            .get(&suite_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
