//! # Student suite feedback
//!
//! One entry per candidate test plus the overall list of exposed buggy
//! implementations. Points go with the exposure feedback: a viewer who is
//! not told what was exposed is not told what it was worth either.

use serde::Serialize;

use db::models::feedback_config::{
    BuggyImplementationsExposedFeedbackLevel, CompilationFeedbackLevel, PointsFeedbackLevel,
    StudentTestValidityFeedbackLevel,
};
use db::models::{
    StudentSuiteFeedbackConfiguration, StudentSuiteResult, StudentTestCaseEvaluation,
    StudentTestSuite,
};

use super::resolve::student_suite_config;
use super::{FeedbackContext, Rendered};
use crate::error::{MarkerError, MarkerResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentTestFeedback {
    pub student_test_case_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_succeeded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_standard_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_standard_error_output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_check_standard_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_check_standard_error_output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buggy_implementations_exposed: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentSuiteFeedback {
    pub student_test_suite_name: String,
    pub student_tests: Vec<StudentTestFeedback>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buggy_implementations_exposed: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points_awarded: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points_possible: Option<u32>,
}

pub fn render_student_suite(
    suite: &StudentTestSuite,
    result: &StudentSuiteResult,
    config: &StudentSuiteFeedbackConfiguration,
) -> MarkerResult<Rendered<StudentSuiteFeedback>> {
    if result.student_test_suite_id != suite.id {
        return Err(MarkerError::ResultMismatch {
            kind: "student suite",
            expected_kind: "student test suite",
            expected: suite.id,
            found: result.student_test_suite_id,
        });
    }

    let exposure = config.buggy_implementations_exposed_feedback_level;
    let mut feedback = StudentSuiteFeedback {
        student_test_suite_name: suite.name.clone(),
        student_tests: result
            .detailed_results
            .iter()
            .map(|evaluation| render_student_test(evaluation, config))
            .collect(),
        ..Default::default()
    };
    if exposure != BuggyImplementationsExposedFeedbackLevel::NoFeedback {
        feedback.buggy_implementations_exposed = Some(result.buggy_implementations_exposed.clone());
    }

    let (points_awarded, points_possible) = match exposure {
        BuggyImplementationsExposedFeedbackLevel::NoFeedback => (0, 0),
        _ => (result.points_awarded(suite), suite.points_possible()),
    };
    let points_shown = config.points_feedback_level != PointsFeedbackLevel::Hide
        && exposure != BuggyImplementationsExposedFeedbackLevel::NoFeedback;
    if points_shown {
        feedback.total_points_awarded = Some(points_awarded);
        feedback.total_points_possible = Some(points_possible);
    }

    Ok(Rendered {
        payload: feedback,
        points_awarded,
        points_possible,
        points_shown,
    })
}

/// Resolves the configuration for `ctx` and renders, or `None` when the
/// suite is hidden from this viewer.
pub fn render_student_suite_for(
    ctx: &FeedbackContext<'_>,
    suite: &StudentTestSuite,
    result: &StudentSuiteResult,
) -> MarkerResult<Option<Rendered<StudentSuiteFeedback>>> {
    let config = student_suite_config(ctx, suite);
    if !ctx.can_see(config.visibility_level) {
        return Ok(None);
    }
    render_student_suite(suite, result, &config).map(Some)
}

fn render_student_test(
    evaluation: &StudentTestCaseEvaluation,
    config: &StudentSuiteFeedbackConfiguration,
) -> StudentTestFeedback {
    let mut feedback = StudentTestFeedback {
        student_test_case_name: evaluation.student_test_case_name.clone(),
        ..Default::default()
    };

    match config.compilation_feedback_level {
        CompilationFeedbackLevel::NoFeedback => {}
        level => {
            feedback.compilation_succeeded = evaluation.compilation_succeeded();
            if level == CompilationFeedbackLevel::ShowCompilerOutput {
                feedback.compilation_standard_output =
                    Some(evaluation.compilation_standard_output.clone());
                feedback.compilation_standard_error_output =
                    Some(evaluation.compilation_standard_error_output.clone());
            }
        }
    }

    match config.student_test_validity_feedback_level {
        StudentTestValidityFeedbackLevel::NoFeedback => {}
        level => {
            feedback.valid = Some(evaluation.valid);
            feedback.timed_out = Some(evaluation.timed_out);
            if level == StudentTestValidityFeedbackLevel::ShowValidityCheckOutput {
                feedback.validity_check_standard_output =
                    Some(evaluation.validity_check_standard_output.clone());
                feedback.validity_check_standard_error_output =
                    Some(evaluation.validity_check_standard_error_output.clone());
            }
        }
    }

    if config.buggy_implementations_exposed_feedback_level
        == BuggyImplementationsExposedFeedbackLevel::ListImplementationsExposedPerTest
    {
        feedback.buggy_implementations_exposed =
            Some(evaluation.buggy_implementations_exposed.clone());
    }
    feedback
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use db::models::feedback_config::VisibilityLevel;
    use db::models::{Project, SubmissionGroup};
    use crate::feedback::Viewer;

    fn suite() -> StudentTestSuite {
        serde_json::from_value(serde_json::json!({
            "id": 7,
            "project_id": 1,
            "name": "mutants",
            "student_test_case_filename_pattern": "test_*.cpp",
            "correct_implementation_filename": "correct.cpp",
            "buggy_implementation_filenames": ["bug1.cpp", "bug2.cpp", "bug3.cpp"],
            "points_per_buggy_implementation_exposed": 2
        }))
        .unwrap()
    }

    fn result() -> StudentSuiteResult {
        let mut valid = StudentTestCaseEvaluation::new("test_a.cpp");
        valid.compilation_return_code = Some(0);
        valid.valid = true;
        valid.validity_check_standard_output = "ok".into();
        valid.buggy_implementations_exposed = vec!["bug1.cpp".into(), "bug2.cpp".into()];

        let mut broken = StudentTestCaseEvaluation::new("test_b.cpp");
        broken.compilation_return_code = Some(1);
        broken.compilation_standard_error_output = "syntax error".into();

        let mut result = StudentSuiteResult::new(7, 3);
        result.buggy_implementations_exposed = vec!["bug1.cpp".into(), "bug2.cpp".into()];
        result.detailed_results = vec![valid, broken];
        result
    }

    #[test]
    fn max_feedback_shows_per_test_detail() {
        let rendered =
            render_student_suite(&suite(), &result(), &StudentSuiteFeedbackConfiguration::max())
                .unwrap();
        let fb = &rendered.payload;

        assert_eq!(fb.total_points_awarded, Some(4));
        assert_eq!(fb.total_points_possible, Some(6));
        assert_eq!(fb.student_tests.len(), 2);
        assert_eq!(fb.student_tests[0].valid, Some(true));
        assert_eq!(fb.student_tests[0].buggy_implementations_exposed.as_ref().map(Vec::len), Some(2));
        assert_eq!(fb.student_tests[1].compilation_succeeded, Some(false));
        assert_eq!(
            fb.student_tests[1].compilation_standard_error_output.as_deref(),
            Some("syntax error")
        );
    }

    #[test]
    fn overall_exposure_hides_per_test_lists() {
        let config = StudentSuiteFeedbackConfiguration {
            buggy_implementations_exposed_feedback_level:
                BuggyImplementationsExposedFeedbackLevel::ListImplementationsExposedOverall,
            student_test_validity_feedback_level: StudentTestValidityFeedbackLevel::ShowValidOrInvalid,
            ..StudentSuiteFeedbackConfiguration::max()
        };
        let rendered = render_student_suite(&suite(), &result(), &config).unwrap();

        assert_eq!(
            rendered.payload.buggy_implementations_exposed,
            Some(vec!["bug1.cpp".to_string(), "bug2.cpp".to_string()])
        );
        assert!(rendered.payload.student_tests.iter().all(|t| t.buggy_implementations_exposed.is_none()));
        assert_eq!(rendered.payload.student_tests[0].validity_check_standard_output, None);
    }

    #[test]
    fn no_exposure_feedback_means_no_points() {
        let config = StudentSuiteFeedbackConfiguration {
            buggy_implementations_exposed_feedback_level: BuggyImplementationsExposedFeedbackLevel::NoFeedback,
            ..StudentSuiteFeedbackConfiguration::max()
        };
        let rendered = render_student_suite(&suite(), &result(), &config).unwrap();

        assert!(!rendered.points_shown);
        assert_eq!((rendered.points_awarded, rendered.points_possible), (0, 0));
        let json = serde_json::to_value(&rendered.payload).unwrap();
        assert!(json.get("total_points_awarded").is_none());
        assert!(json.get("buggy_implementations_exposed").is_none());
    }

    #[test]
    fn default_configuration_shows_names_only() {
        let rendered =
            render_student_suite(&suite(), &result(), &StudentSuiteFeedbackConfiguration::default())
                .unwrap();
        let json = serde_json::to_value(&rendered.payload).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "student_test_suite_name": "mutants",
                "student_tests": [
                    {"student_test_case_name": "test_a.cpp"},
                    {"student_test_case_name": "test_b.cpp"}
                ]
            })
        );
    }

    #[test]
    fn post_deadline_override_applies_to_final_submission() {
        let mut suite = suite();
        suite.feedback_configuration = StudentSuiteFeedbackConfiguration {
            visibility_level: VisibilityLevel::ShowToStudents,
            ..StudentSuiteFeedbackConfiguration::max()
        };
        suite.post_deadline_final_submission_feedback_configuration =
            Some(StudentSuiteFeedbackConfiguration {
                visibility_level: VisibilityLevel::ShowToStudents,
                ..Default::default()
            });
        let project = Project {
            id: 1,
            name: "p".into(),
            closing_time: Some(Utc::now() - Duration::days(1)),
            project_files: vec![],
        };
        let group = SubmissionGroup {
            id: 1,
            project_id: 1,
            members: vec![],
            extended_due_date: None,
            submission_ids: vec![2, 3],
        };

        let ctx = FeedbackContext::new(Utc::now(), Viewer::Student, 3, &group, &project);
        let rendered = render_student_suite_for(&ctx, &suite, &result()).unwrap().unwrap();
        assert!(!rendered.points_shown);
        assert_eq!(rendered.payload.total_points_awarded, None);

        let mut earlier = result();
        earlier.submission_id = 2;
        let ctx = FeedbackContext::new(Utc::now(), Viewer::Student, 2, &group, &project);
        let rendered = render_student_suite_for(&ctx, &suite, &earlier).unwrap().unwrap();
        assert_eq!(rendered.payload.total_points_awarded, Some(4));
    }

    #[test]
    fn hidden_suite_renders_nothing_for_students() {
        let suite = suite();
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
            submission_ids: vec![3],
        };
        let ctx = FeedbackContext::new(Utc::now(), Viewer::Student, 3, &group, &project);
        assert!(render_student_suite_for(&ctx, &suite, &result()).unwrap().is_none());

        let staff = FeedbackContext { viewer: Viewer::Staff, ..ctx };
        assert!(render_student_suite_for(&staff, &suite, &result()).unwrap().is_some());
    }
}
