//! # Test case feedback
//!
//! Renders a [`TestCaseResult`] under one [`FeedbackConfiguration`].
//!
//! A section (compilation, return code, output, valgrind) appears only when
//! its level is not `no_feedback` and the test actually checks that
//! dimension. Points follow the same gating: a section contributes to the
//! breakdown and to `total_points_possible` only when it is shown and worth
//! something, so two viewers can see different totals for the same result.
//!
//! When a compiled test fails to build, or any test times out, only the
//! compilation section, `timed_out` and the points survive.

use serde::Serialize;

use db::models::feedback_config::{
    CompilationFeedbackLevel, OutputFeedbackLevel, PointsFeedbackLevel, ReturnCodeFeedbackLevel,
    ValgrindFeedbackLevel,
};
use db::models::{AgTestCase, FeedbackConfiguration, TestCaseResult};

use super::resolve::test_case_config;
use super::{FeedbackContext, Rendered};
use crate::error::{MarkerError, MarkerResult};
use crate::scorer::test_case_points;
use crate::utilities::line_diff::line_diff;

/// The redacted view of one test case result. Absent fields are omitted
/// from the JSON entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestCaseFeedback {
    pub test_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_succeeded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_stderr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code_correct: Option<bool>,
    /// `Some(None)` serializes as `null`: the test accepts any nonzero code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_return_code: Option<Option<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_return_code: Option<Option<i32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_error_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_diff: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_diff: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub valgrind_errors_present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valgrind_output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_points_awarded: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_points_possible: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code_points_awarded: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code_points_possible: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_points_awarded: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_points_possible: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valgrind_points_deducted: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points_awarded: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points_possible: Option<u32>,
}

/// Which sections this configuration shows for this test.
#[derive(Debug, Clone, Copy)]
struct Sections {
    compilation: bool,
    return_code: bool,
    output: bool,
    valgrind: bool,
}

impl Sections {
    fn new(case: &AgTestCase, config: &FeedbackConfiguration) -> Self {
        let base = &case.base;
        Self {
            compilation: case.checks_compilation()
                && config.compilation_feedback_level != CompilationFeedbackLevel::NoFeedback,
            return_code: base.checks_return_code()
                && config.return_code_feedback_level != ReturnCodeFeedbackLevel::NoFeedback,
            output: base.checks_output()
                && config.output_feedback_level != OutputFeedbackLevel::NoFeedback,
            valgrind: base.use_valgrind
                && config.valgrind_feedback_level != ValgrindFeedbackLevel::NoFeedback,
        }
    }
}

/// Points earned in the shown sections.
#[derive(Debug, Clone, Copy, Default)]
struct Earned {
    compilation: u32,
    return_code: u32,
    output: u32,
    valgrind_deduction: u32,
}

/// Renders `result` under `config`. Pure: the same inputs always produce
/// the same payload.
pub fn render_test_case(
    case: &AgTestCase,
    result: &TestCaseResult,
    config: &FeedbackConfiguration,
) -> MarkerResult<Rendered<TestCaseFeedback>> {
    if result.test_case_id != case.id {
        return Err(MarkerError::ResultMismatch {
            kind: "test case",
            expected_kind: "test case",
            expected: case.id,
            found: result.test_case_id,
        });
    }

    let base = &case.base;
    let sections = Sections::new(case, config);
    let mut feedback = TestCaseFeedback {
        test_name: base.name.clone(),
        ..Default::default()
    };
    let mut earned = Earned::default();

    if sections.compilation {
        let succeeded = result.compilation_succeeded();
        feedback.compilation_succeeded = Some(succeeded);
        if config.compilation_feedback_level == CompilationFeedbackLevel::ShowCompilerOutput {
            feedback.compilation_stdout = Some(result.compilation_standard_output.clone());
            feedback.compilation_stderr = Some(result.compilation_standard_error_output.clone());
        }
        if succeeded {
            earned.compilation = base.points_for_compilation_success;
        }
    }

    let build_failed = case.checks_compilation() && !result.compilation_succeeded();
    if !build_failed {
        feedback.timed_out = Some(result.timed_out);
    }

    if !build_failed && !result.timed_out {
        render_return_code(case, result, config, sections, &mut feedback, &mut earned);
        render_output(case, result, config, sections, &mut feedback, &mut earned);
        render_valgrind(case, result, config, sections, &mut feedback, &mut earned);
    }

    let (points_awarded, points_possible) = render_points(case, config, sections, earned, &mut feedback);
    Ok(Rendered {
        payload: feedback,
        points_awarded,
        points_possible,
        points_shown: config.points_feedback_level != PointsFeedbackLevel::Hide,
    })
}

/// Resolves the configuration for `ctx` and renders, or returns `None` when
/// the viewer may not see this test at all.
pub fn render_test_case_for(
    ctx: &FeedbackContext<'_>,
    case: &AgTestCase,
    result: &TestCaseResult,
) -> MarkerResult<Option<Rendered<TestCaseFeedback>>> {
    let config = test_case_config(ctx, &case.base);
    if !ctx.can_see(config.visibility_level) {
        return Ok(None);
    }
    render_test_case(case, result, &config).map(Some)
}

fn render_return_code(
    case: &AgTestCase,
    result: &TestCaseResult,
    config: &FeedbackConfiguration,
    sections: Sections,
    feedback: &mut TestCaseFeedback,
    earned: &mut Earned,
) {
    if !sections.return_code {
        return;
    }
    let correct = result.return_code_correct(&case.base);
    feedback.return_code_correct = Some(correct);
    if config.return_code_feedback_level == ReturnCodeFeedbackLevel::ShowExpectedAndActualValues {
        feedback.expected_return_code = Some(case.base.expected_return_code);
        feedback.actual_return_code = Some(result.return_code);
    }
    if correct {
        earned.return_code = case.base.points_for_correct_return_code;
    }
}

fn render_output(
    case: &AgTestCase,
    result: &TestCaseResult,
    config: &FeedbackConfiguration,
    sections: Sections,
    feedback: &mut TestCaseFeedback,
    earned: &mut Earned,
) {
    let base = &case.base;
    let level = config.output_feedback_level;
    let show_program_output = level == OutputFeedbackLevel::ShowProgramOutput
        || (level == OutputFeedbackLevel::ShowExpectedAndActualValues && !base.checks_output());
    if show_program_output {
        feedback.standard_output = Some(result.standard_output.clone());
        feedback.standard_error_output = Some(result.standard_error_output.clone());
    }

    if !sections.output {
        return;
    }
    let correct = result.output_correct(base);
    feedback.output_correct = Some(correct);
    if level == OutputFeedbackLevel::ShowExpectedAndActualValues {
        feedback.stdout_diff = Some(line_diff(
            &base.expected_standard_output,
            &result.standard_output,
        ));
        feedback.stderr_diff = Some(line_diff(
            &base.expected_standard_error_output,
            &result.standard_error_output,
        ));
    }
    if correct {
        earned.output = base.points_for_correct_output;
    }
}

fn render_valgrind(
    case: &AgTestCase,
    result: &TestCaseResult,
    config: &FeedbackConfiguration,
    sections: Sections,
    feedback: &mut TestCaseFeedback,
    earned: &mut Earned,
) {
    if !sections.valgrind {
        return;
    }
    let errors = result.valgrind_errors_present();
    feedback.valgrind_errors_present = Some(errors);
    if config.valgrind_feedback_level == ValgrindFeedbackLevel::ShowValgrindOutput {
        feedback.valgrind_output = Some(result.valgrind_output.clone());
    }
    if errors {
        earned.valgrind_deduction = case.base.deduction_for_valgrind_errors;
    }
}

/// Fills the points keys (unless hidden) and returns `(awarded, possible)`.
fn render_points(
    case: &AgTestCase,
    config: &FeedbackConfiguration,
    sections: Sections,
    earned: Earned,
    feedback: &mut TestCaseFeedback,
) -> (u32, u32) {
    let base = &case.base;
    let awarded = test_case_points(
        earned.compilation,
        earned.return_code,
        earned.output,
        earned.valgrind_deduction,
    );

    let mut possible = 0;
    let mut breakdown = TestCaseFeedback::default();
    if sections.compilation && base.points_for_compilation_success > 0 {
        breakdown.compilation_points_awarded = Some(earned.compilation);
        breakdown.compilation_points_possible = Some(base.points_for_compilation_success);
        possible += base.points_for_compilation_success;
    }
    if sections.return_code && base.points_for_correct_return_code > 0 {
        breakdown.return_code_points_awarded = Some(earned.return_code);
        breakdown.return_code_points_possible = Some(base.points_for_correct_return_code);
        possible += base.points_for_correct_return_code;
    }
    if sections.output && base.points_for_correct_output > 0 {
        breakdown.output_points_awarded = Some(earned.output);
        breakdown.output_points_possible = Some(base.points_for_correct_output);
        possible += base.points_for_correct_output;
    }
    if sections.valgrind && base.deduction_for_valgrind_errors > 0 {
        breakdown.valgrind_points_deducted = Some(earned.valgrind_deduction);
    }

    match config.points_feedback_level {
        PointsFeedbackLevel::Hide => {}
        level => {
            if level == PointsFeedbackLevel::ShowBreakdown {
                feedback.compilation_points_awarded = breakdown.compilation_points_awarded;
                feedback.compilation_points_possible = breakdown.compilation_points_possible;
                feedback.return_code_points_awarded = breakdown.return_code_points_awarded;
                feedback.return_code_points_possible = breakdown.return_code_points_possible;
                feedback.output_points_awarded = breakdown.output_points_awarded;
                feedback.output_points_possible = breakdown.output_points_possible;
                feedback.valgrind_points_deducted = breakdown.valgrind_points_deducted;
            }
            feedback.total_points_awarded = Some(awarded);
            feedback.total_points_possible = Some(possible);
        }
    }
    (awarded, possible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::{CompiledProgram, InterpretedProgram, TestCaseBase, TestCaseKind};
    use util::languages::Interpreter;

    fn compiled_case(base: TestCaseBase) -> AgTestCase {
        AgTestCase {
            id: 1,
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

    fn interpreted_case(base: TestCaseBase) -> AgTestCase {
        AgTestCase {
            id: 1,
            suite_id: 1,
            base,
            kind: TestCaseKind::Interpreted(InterpretedProgram {
                interpreter: Interpreter::Python3,
                interpreter_flags: vec![],
                entry_point_filename: "main.py".into(),
            }),
        }
    }

    fn graded_base() -> TestCaseBase {
        let mut base = TestCaseBase::new("adds numbers");
        base.expected_return_code = Some(0);
        base.expected_standard_output = "3\n".into();
        base.points_for_compilation_success = 1;
        base.points_for_correct_return_code = 2;
        base.points_for_correct_output = 3;
        base
    }

    fn passing_result() -> TestCaseResult {
        let mut result = TestCaseResult::new(1, 1);
        result.compilation_return_code = Some(0);
        result.return_code = Some(0);
        result.standard_output = "3\n".into();
        result
    }

    fn json_keys(feedback: &TestCaseFeedback) -> Vec<String> {
        match serde_json::to_value(feedback).unwrap() {
            serde_json::Value::Object(map) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                keys
            }
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn hidden_points_leave_no_points_keys() {
        let config = FeedbackConfiguration {
            points_feedback_level: PointsFeedbackLevel::Hide,
            ..FeedbackConfiguration::max()
        };
        let rendered = render_test_case(&compiled_case(graded_base()), &passing_result(), &config).unwrap();

        assert!(!rendered.points_shown);
        assert!(json_keys(&rendered.payload).iter().all(|k| !k.contains("points")));
        assert_eq!((rendered.points_awarded, rendered.points_possible), (6, 6));
    }

    #[test]
    fn max_feedback_shows_everything() {
        let mut result = passing_result();
        result.standard_output = "4\n".into();
        let rendered =
            render_test_case(&compiled_case(graded_base()), &result, &FeedbackConfiguration::max())
                .unwrap();
        let fb = &rendered.payload;

        assert_eq!(fb.compilation_succeeded, Some(true));
        assert_eq!(fb.compilation_stdout.as_deref(), Some(""));
        assert_eq!(fb.timed_out, Some(false));
        assert_eq!(fb.return_code_correct, Some(true));
        assert_eq!(fb.expected_return_code, Some(Some(0)));
        assert_eq!(fb.actual_return_code, Some(Some(0)));
        assert_eq!(fb.output_correct, Some(false));
        assert_eq!(fb.stdout_diff.as_deref(), Some(&["- 3\n".to_string(), "+ 4\n".to_string()][..]));
        assert_eq!(fb.stderr_diff.as_deref(), Some(&[][..]));
        assert_eq!(fb.standard_output, None);
        assert_eq!(fb.output_points_awarded, Some(0));
        assert_eq!(fb.output_points_possible, Some(3));
        assert_eq!(fb.total_points_awarded, Some(3));
        assert_eq!(fb.total_points_possible, Some(6));
    }

    #[test]
    fn failed_build_keeps_only_compilation_and_points() {
        let mut result = TestCaseResult::new(1, 1);
        result.compilation_return_code = Some(2);
        result.compilation_standard_error_output = "error".into();
        let rendered =
            render_test_case(&compiled_case(graded_base()), &result, &FeedbackConfiguration::max())
                .unwrap();

        assert_eq!(
            json_keys(&rendered.payload),
            [
                "compilation_points_awarded",
                "compilation_points_possible",
                "compilation_stderr",
                "compilation_stdout",
                "compilation_succeeded",
                "output_points_awarded",
                "output_points_possible",
                "return_code_points_awarded",
                "return_code_points_possible",
                "test_name",
                "total_points_awarded",
                "total_points_possible",
            ]
        );
        assert_eq!(rendered.points_awarded, 0);
        assert_eq!(rendered.points_possible, 6);
    }

    #[test]
    fn timeout_skips_run_sections() {
        let mut result = passing_result();
        result.timed_out = true;
        result.return_code = None;
        let rendered =
            render_test_case(&compiled_case(graded_base()), &result, &FeedbackConfiguration::max())
                .unwrap();

        assert_eq!(rendered.payload.timed_out, Some(true));
        assert_eq!(rendered.payload.return_code_correct, None);
        assert_eq!(rendered.payload.output_correct, None);
        assert_eq!(rendered.points_awarded, 1);
    }

    #[test]
    fn possible_points_follow_what_the_viewer_sees() {
        let config = FeedbackConfiguration {
            output_feedback_level: OutputFeedbackLevel::NoFeedback,
            points_feedback_level: PointsFeedbackLevel::ShowTotal,
            ..FeedbackConfiguration::max()
        };
        let rendered = render_test_case(&compiled_case(graded_base()), &passing_result(), &config).unwrap();

        assert_eq!(rendered.payload.output_correct, None);
        assert_eq!(rendered.payload.output_points_possible, None);
        assert_eq!(rendered.payload.total_points_awarded, Some(3));
        assert_eq!(rendered.payload.total_points_possible, Some(3));
    }

    #[test]
    fn any_nonzero_expectation_ignores_expected_code() {
        let mut base = TestCaseBase::new("crashes");
        base.expect_any_nonzero_return_code = true;
        base.expected_return_code = Some(0);
        base.points_for_correct_return_code = 1;
        let mut result = TestCaseResult::new(1, 1);
        result.return_code = Some(3);

        let rendered =
            render_test_case(&interpreted_case(base), &result, &FeedbackConfiguration::max()).unwrap();
        assert_eq!(rendered.payload.return_code_correct, Some(true));
        assert_eq!(rendered.payload.compilation_succeeded, None);
        assert_eq!(rendered.points_awarded, 1);
    }

    #[test]
    fn program_output_is_shown_when_nothing_is_compared() {
        let base = TestCaseBase::new("just runs");
        let mut result = TestCaseResult::new(1, 1);
        result.return_code = Some(0);
        result.standard_output = "hello\n".into();

        let rendered =
            render_test_case(&interpreted_case(base), &result, &FeedbackConfiguration::max()).unwrap();
        assert_eq!(rendered.payload.standard_output.as_deref(), Some("hello\n"));
        assert_eq!(rendered.payload.output_correct, None);
        assert_eq!(rendered.payload.stdout_diff, None);
        assert_eq!(rendered.payload.total_points_possible, Some(0));
    }

    #[test]
    fn valgrind_deduction_never_goes_negative() {
        let mut base = graded_base();
        base.use_valgrind = true;
        base.deduction_for_valgrind_errors = 10;
        let mut result = passing_result();
        result.valgrind_return_code = Some(1);
        result.valgrind_output = "leak".into();

        let rendered =
            render_test_case(&compiled_case(base), &result, &FeedbackConfiguration::max()).unwrap();
        assert_eq!(rendered.payload.valgrind_errors_present, Some(true));
        assert_eq!(rendered.payload.valgrind_output.as_deref(), Some("leak"));
        assert_eq!(rendered.payload.valgrind_points_deducted, Some(10));
        assert_eq!(rendered.points_awarded, 1);
    }

    #[test]
    fn rendering_is_repeatable() {
        let case = compiled_case(graded_base());
        let result = passing_result();
        let config = FeedbackConfiguration::max();
        let first = serde_json::to_string(&render_test_case(&case, &result, &config).unwrap()).unwrap();
        let second = serde_json::to_string(&render_test_case(&case, &result, &config).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn result_for_another_test_is_rejected() {
        let result = TestCaseResult::new(99, 1);
        let err = render_test_case(&compiled_case(graded_base()), &result, &FeedbackConfiguration::max())
            .unwrap_err();
        assert!(matches!(err, MarkerError::ResultMismatch { found: 99, .. }));
    }
}
