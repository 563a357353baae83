//! Feedback configurations: immutable value objects with one independent
//! level per concern. The renderer in `marker` reads them; nothing here
//! knows how a level is applied.

use serde::{Deserialize, Serialize};

/// Who may see a test or suite at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityLevel {
    HideFromStudentsAndStaffViewers,
    #[default]
    HideFromStudents,
    ShowToStudents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilationFeedbackLevel {
    #[default]
    NoFeedback,
    SuccessOrFailureOnly,
    ShowCompilerOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnCodeFeedbackLevel {
    #[default]
    NoFeedback,
    CorrectOrIncorrectOnly,
    ShowExpectedAndActualValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFeedbackLevel {
    #[default]
    NoFeedback,
    CorrectOrIncorrectOnly,
    ShowExpectedAndActualValues,
    ShowProgramOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValgrindFeedbackLevel {
    #[default]
    NoFeedback,
    ErrorsOrNoErrorsOnly,
    ShowValgrindOutput,
}

/// `show_total` and `show_breakdown` only count the parts of a test the
/// viewer receives feedback on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsFeedbackLevel {
    #[default]
    Hide,
    ShowTotal,
    ShowBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentTestValidityFeedbackLevel {
    #[default]
    NoFeedback,
    ShowValidOrInvalid,
    ShowValidityCheckOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuggyImplementationsExposedFeedbackLevel {
    #[default]
    NoFeedback,
    ListImplementationsExposedOverall,
    ListImplementationsExposedPerTest,
}

/// How much of an instructor test's result a viewer gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedbackConfiguration {
    pub visibility_level: VisibilityLevel,
    pub compilation_feedback_level: CompilationFeedbackLevel,
    pub return_code_feedback_level: ReturnCodeFeedbackLevel,
    pub output_feedback_level: OutputFeedbackLevel,
    pub valgrind_feedback_level: ValgrindFeedbackLevel,
    pub points_feedback_level: PointsFeedbackLevel,
}

impl FeedbackConfiguration {
    /// Everything visible, every section at its most verbose.
    pub fn max() -> Self {
        Self {
            visibility_level: VisibilityLevel::ShowToStudents,
            compilation_feedback_level: CompilationFeedbackLevel::ShowCompilerOutput,
            return_code_feedback_level: ReturnCodeFeedbackLevel::ShowExpectedAndActualValues,
            output_feedback_level: OutputFeedbackLevel::ShowExpectedAndActualValues,
            valgrind_feedback_level: ValgrindFeedbackLevel::ShowValgrindOutput,
            points_feedback_level: PointsFeedbackLevel::ShowBreakdown,
        }
    }
}

/// How much of a student test suite evaluation a viewer gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StudentSuiteFeedbackConfiguration {
    pub visibility_level: VisibilityLevel,
    pub compilation_feedback_level: CompilationFeedbackLevel,
    pub student_test_validity_feedback_level: StudentTestValidityFeedbackLevel,
    pub buggy_implementations_exposed_feedback_level: BuggyImplementationsExposedFeedbackLevel,
    pub points_feedback_level: PointsFeedbackLevel,
}

impl StudentSuiteFeedbackConfiguration {
    pub fn max() -> Self {
        Self {
            visibility_level: VisibilityLevel::ShowToStudents,
            compilation_feedback_level: CompilationFeedbackLevel::ShowCompilerOutput,
            student_test_validity_feedback_level:
                StudentTestValidityFeedbackLevel::ShowValidityCheckOutput,
            buggy_implementations_exposed_feedback_level:
                BuggyImplementationsExposedFeedbackLevel::ListImplementationsExposedPerTest,
            points_feedback_level: PointsFeedbackLevel::ShowBreakdown,
        }
    }
}
