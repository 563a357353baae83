use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A programming project students submit against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    /// No closing time means the project never goes past its deadline.
    #[serde(default)]
    pub closing_time: Option<DateTime<Utc>>,
    /// Instructor files available to tests (`test_resource_files` etc.).
    #[serde(default)]
    pub project_files: Vec<String>,
}

/// The students who submit together for one project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubmissionGroup {
    pub id: i64,
    pub project_id: i64,
    #[serde(default)]
    pub members: Vec<String>,
    /// Per-group deadline override; wins over the project closing time.
    #[serde(default)]
    pub extended_due_date: Option<DateTime<Utc>>,
    /// Submission ids, oldest first.
    #[serde(default)]
    pub submission_ids: Vec<i64>,
}

impl SubmissionGroup {
    /// The group's most recent submission, if any.
    pub fn latest_submission_id(&self) -> Option<i64> {
        self.submission_ids.last().copied()
    }

    pub fn is_final_submission(&self, submission_id: i64) -> bool {
        self.latest_submission_id() == Some(submission_id)
    }

    /// The deadline that applies to this group.
    pub fn effective_deadline(&self, project: &Project) -> Option<DateTime<Utc>> {
        self.extended_due_date.or(project.closing_time)
    }
}
