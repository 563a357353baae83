//! # Feedback
//!
//! Turns raw results into what a particular viewer is allowed to see.
//!
//! - [`resolve`] picks which feedback configuration applies.
//! - [`test_case`] renders one instructor test result.
//! - [`student_suite`] renders one mutation-testing suite result.
//!
//! Everything here is a pure function of its arguments. In particular "now"
//! is passed in through [`FeedbackContext`] rather than read from a clock,
//! so rendering the same inputs twice yields identical payloads.

pub mod resolve;
pub mod student_suite;
pub mod test_case;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use db::models::feedback_config::VisibilityLevel;
use db::models::{Project, SubmissionGroup};

/// Who is looking at the feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Viewer {
    Student,
    Staff,
}

/// Everything outside the result itself that decides what gets shown.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackContext<'a> {
    pub now: DateTime<Utc>,
    pub viewer: Viewer,
    /// Set for staff inspecting their own submissions; wins over every
    /// configuration.
    pub max_feedback: bool,
    pub submission_id: i64,
    pub group: &'a SubmissionGroup,
    pub project: &'a Project,
}

impl<'a> FeedbackContext<'a> {
    pub fn new(
        now: DateTime<Utc>,
        viewer: Viewer,
        submission_id: i64,
        group: &'a SubmissionGroup,
        project: &'a Project,
    ) -> Self {
        Self {
            now,
            viewer,
            max_feedback: false,
            submission_id,
            group,
            project,
        }
    }

    pub fn with_max_feedback(mut self) -> Self {
        self.max_feedback = true;
        self
    }

    /// Whether something configured with `visibility` is shown at all.
    pub fn can_see(&self, visibility: VisibilityLevel) -> bool {
        if self.max_feedback {
            return true;
        }
        match self.viewer {
            Viewer::Student => visibility == VisibilityLevel::ShowToStudents,
            Viewer::Staff => visibility != VisibilityLevel::HideFromStudentsAndStaffViewers,
        }
    }
}

/// A rendered payload and the points it accounts for.
///
/// `points_awarded`/`points_possible` are what the payload's totals would
/// show; when points are hidden they are still computed but the payload
/// omits them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered<T> {
    pub payload: T,
    pub points_awarded: u32,
    pub points_possible: u32,
    pub points_shown: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_depends_on_viewer() {
        let project = Project {
            id: 1,
            name: "p".into(),
            closing_time: None,
            project_files: vec![],
        };
        let group = SubmissionGroup {
            id: 1,
            project_id: 1,
            members: vec![],
            extended_due_date: None,
            submission_ids: vec![1],
        };
        let student = FeedbackContext::new(Utc::now(), Viewer::Student, 1, &group, &project);
        let staff = FeedbackContext {
            viewer: Viewer::Staff,
            ..student
        };

        assert!(!student.can_see(VisibilityLevel::HideFromStudents));
        assert!(student.can_see(VisibilityLevel::ShowToStudents));
        assert!(staff.can_see(VisibilityLevel::HideFromStudents));
        assert!(!staff.can_see(VisibilityLevel::HideFromStudentsAndStaffViewers));
        assert!(
            staff
                .with_max_feedback()
                .can_see(VisibilityLevel::HideFromStudentsAndStaffViewers)
        );
    }
}
