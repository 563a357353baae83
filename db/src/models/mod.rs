pub mod ag_test_suite;
pub mod feedback_config;
pub mod project;
pub mod rerun_task;
pub mod results;
pub mod student_test_suite;
pub mod submission;
pub mod test_case;

pub use ag_test_suite::AgTestSuite;
pub use feedback_config::{FeedbackConfiguration, StudentSuiteFeedbackConfiguration};
pub use project::{Project, SubmissionGroup};
pub use rerun_task::RerunSubmissionsTask;
pub use results::{StudentSuiteResult, StudentTestCaseEvaluation, TestCaseResult};
pub use student_test_suite::StudentTestSuite;
pub use submission::{Submission, SubmissionStatus};
pub use test_case::{AgTestCase, CompiledProgram, InterpretedProgram, TestCaseBase, TestCaseKind};
