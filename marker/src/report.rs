//! # Submission Report
//!
//! Collects the rendered feedback for every test case and student suite of
//! one submission that the viewer may see, and totals the points that were
//! shown.
//!
//! ## JSON Output Example
//!
//! ```json
//! {
//!   "success": true,
//!   "message": "Feedback ready.",
//!   "data": {
//!     "submission_id": 12,
//!     "ag_test_suites": [
//!       { "ag_test_suite_id": 1, "ag_test_suite_name": "basics", "test_cases": [ ... ] }
//!     ],
//!     "student_test_suites": [ ... ],
//!     "total_points_awarded": 7,
//!     "total_points_possible": 10,
//!     "percentage": 70.0
//!   }
//! }
//! ```
//!
//! Tests without a stored result (not graded yet, or deferred and still
//! pending) are left out rather than reported as zero.

use std::collections::HashMap;

use serde::Serialize;

use db::models::{AgTestSuite, StudentSuiteResult, StudentTestSuite, TestCaseResult};

use crate::error::{MarkerError, MarkerResult};
use crate::feedback::student_suite::{StudentSuiteFeedback, render_student_suite_for};
use crate::feedback::test_case::{TestCaseFeedback, render_test_case_for};
use crate::feedback::{FeedbackContext, Rendered};
use crate::scorer::Score;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgSuiteReport {
    pub ag_test_suite_id: i64,
    pub ag_test_suite_name: String,
    pub test_cases: Vec<TestCaseFeedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReport {
    pub submission_id: i64,
    pub ag_test_suites: Vec<AgSuiteReport>,
    pub student_test_suites: Vec<StudentSuiteFeedback>,
    pub total_points_awarded: u32,
    pub total_points_possible: u32,
    /// Awarded over possible, rounded to two decimals.
    pub percentage: f64,
}

/// Response envelope handed to whatever serves the report.
#[derive(Debug, Serialize)]
pub struct SubmissionReportResponse {
    success: bool,
    message: String,
    data: SubmissionReport,
}

impl From<SubmissionReport> for SubmissionReportResponse {
    fn from(report: SubmissionReport) -> Self {
        SubmissionReportResponse {
            success: true,
            message: "Feedback ready.".to_string(),
            data: report,
        }
    }
}

/// Renders every visible result of `ctx.submission_id`.
///
/// All results must belong to that submission; a result from another
/// submission is rejected with [`MarkerError::SubmissionMismatch`].
pub fn build_submission_report(
    ctx: &FeedbackContext<'_>,
    ag_suites: &[AgTestSuite],
    student_suites: &[StudentTestSuite],
    results: &[TestCaseResult],
    student_results: &[StudentSuiteResult],
) -> MarkerResult<SubmissionReport> {
    let submission_ids = results
        .iter()
        .map(|r| r.submission_id)
        .chain(student_results.iter().map(|r| r.submission_id));
    for found in submission_ids {
        if found != ctx.submission_id {
            return Err(MarkerError::SubmissionMismatch {
                expected: ctx.submission_id,
                found,
            });
        }
    }

    let by_case: HashMap<i64, &TestCaseResult> =
        results.iter().map(|r| (r.test_case_id, r)).collect();
    let by_suite: HashMap<i64, &StudentSuiteResult> = student_results
        .iter()
        .map(|r| (r.student_test_suite_id, r))
        .collect();

    let mut total = Score::default();

    let mut ag_reports = Vec::new();
    for suite in ag_suites {
        let mut test_cases = Vec::new();
        for case in &suite.test_cases {
            let Some(result) = by_case.get(&case.id) else {
                continue;
            };
            if let Some(rendered) = render_test_case_for(ctx, case, result)? {
                total.add(shown_points(&rendered));
                test_cases.push(rendered.payload);
            }
        }
        if !test_cases.is_empty() {
            ag_reports.push(AgSuiteReport {
                ag_test_suite_id: suite.id,
                ag_test_suite_name: suite.name.clone(),
                test_cases,
            });
        }
    }

    let mut student_reports = Vec::new();
    for suite in student_suites {
        let Some(result) = by_suite.get(&suite.id) else {
            continue;
        };
        if let Some(rendered) = render_student_suite_for(ctx, suite, result)? {
            total.add(shown_points(&rendered));
            student_reports.push(rendered.payload);
        }
    }

    tracing::debug!(
        submission_id = ctx.submission_id,
        viewer = ?ctx.viewer,
        awarded = total.awarded,
        possible = total.possible,
        "built submission report"
    );

    Ok(SubmissionReport {
        submission_id: ctx.submission_id,
        ag_test_suites: ag_reports,
        student_test_suites: student_reports,
        total_points_awarded: total.awarded,
        total_points_possible: total.possible,
        percentage: total.percentage(),
    })
}

fn shown_points<T>(rendered: &Rendered<T>) -> Score {
    if rendered.points_shown {
        Score::new(rendered.points_awarded, rendered.points_possible)
    } else {
        Score::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Viewer;
    use chrono::Utc;
    use db::models::feedback_config::{PointsFeedbackLevel, VisibilityLevel};
    use db::models::{
        AgTestCase, CompiledProgram, FeedbackConfiguration, Project, SubmissionGroup,
        TestCaseBase, TestCaseKind,
    };
    use serde_json::Value;

    fn case(id: i64, visibility: VisibilityLevel, points: PointsFeedbackLevel) -> AgTestCase {
        let mut base = TestCaseBase::new(format!("case {id}"));
        base.expected_return_code = Some(0);
        base.points_for_correct_return_code = 5;
        base.feedback_configuration = FeedbackConfiguration {
            visibility_level: visibility,
            points_feedback_level: points,
            ..FeedbackConfiguration::max()
        };
        AgTestCase {
            id,
            suite_id: 1,
            base,
            kind: TestCaseKind::CompiledAndRun(CompiledProgram {
                compiler: Default::default(),
                compiler_flags: vec![],
                project_files_to_compile_together: vec![],
                student_files_to_compile_together: vec!["*.cpp".into()],
                executable_name: "prog".into(),
            }),
        }
    }

    fn result(case_id: i64, return_code: i32) -> TestCaseResult {
        let mut result = TestCaseResult::new(case_id, 4);
        result.compilation_return_code = Some(0);
        result.return_code = Some(return_code);
        result
    }

    fn fixtures() -> (Project, SubmissionGroup, Vec<AgTestSuite>) {
        let project = Project {
            id: 1,
            name: "p".into(),
            closing_time: None,
            project_files: vec![],
        };
        let group = SubmissionGroup {
            id: 1,
            project_id: 1,
            members: vec!["alice".into()],
            extended_due_date: None,
            submission_ids: vec![4],
        };
        let suite = AgTestSuite {
            id: 1,
            project_id: 1,
            name: "basics".into(),
            deferred: false,
            test_cases: vec![
                case(1, VisibilityLevel::ShowToStudents, PointsFeedbackLevel::ShowTotal),
                case(2, VisibilityLevel::ShowToStudents, PointsFeedbackLevel::Hide),
                case(3, VisibilityLevel::HideFromStudents, PointsFeedbackLevel::ShowTotal),
                case(4, VisibilityLevel::ShowToStudents, PointsFeedbackLevel::ShowTotal),
            ],
        };
        (project, group, vec![suite])
    }

    #[test]
    fn student_totals_count_only_visible_shown_points() {
        let (project, group, suites) = fixtures();
        let results = vec![result(1, 0), result(2, 0), result(3, 1)];
        let ctx = FeedbackContext::new(Utc::now(), Viewer::Student, 4, &group, &project);

        let report = build_submission_report(&ctx, &suites, &[], &results, &[]).unwrap();

        let names: Vec<_> = report.ag_test_suites[0]
            .test_cases
            .iter()
            .map(|c| c.test_name.as_str())
            .collect();
        assert_eq!(names, ["case 1", "case 2"]);
        assert_eq!(report.total_points_awarded, 5);
        assert_eq!(report.total_points_possible, 5);
        assert_eq!(report.percentage, 100.0);
    }

    #[test]
    fn staff_see_hidden_cases() {
        let (project, group, suites) = fixtures();
        let results = vec![result(1, 0), result(2, 0), result(3, 1)];
        let ctx = FeedbackContext::new(Utc::now(), Viewer::Staff, 4, &group, &project);

        let report = build_submission_report(&ctx, &suites, &[], &results, &[]).unwrap();

        assert_eq!(report.ag_test_suites[0].test_cases.len(), 3);
        assert_eq!(report.total_points_awarded, 5);
        assert_eq!(report.total_points_possible, 10);
        assert_eq!(report.percentage, 50.0);
    }

    #[test]
    fn results_from_another_submission_are_rejected() {
        let (project, group, suites) = fixtures();
        let mut stray = result(1, 0);
        stray.submission_id = 9;
        let ctx = FeedbackContext::new(Utc::now(), Viewer::Staff, 4, &group, &project);

        let err = build_submission_report(&ctx, &suites, &[], &[stray], &[]).unwrap_err();
        assert_eq!(err, MarkerError::SubmissionMismatch { expected: 4, found: 9 });
    }

    #[test]
    fn empty_report_wraps_in_response() {
        let (project, group, suites) = fixtures();
        let ctx = FeedbackContext::new(Utc::now(), Viewer::Student, 4, &group, &project);
        let report = build_submission_report(&ctx, &suites, &[], &[], &[]).unwrap();

        let response: SubmissionReportResponse = report.into();
        let value: Value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["submission_id"], 4);
        assert!(value["data"]["ag_test_suites"].as_array().unwrap().is_empty());
        assert_eq!(value["data"]["percentage"], 0.0);
    }
}
