//! Raw grading results. Executors produce them, the store keeps the latest
//! row per `(test, submission)` pair, and the feedback engine reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::student_test_suite::StudentTestSuite;
use crate::models::test_case::TestCaseBase;

/// What happened when one instructor test ran against one submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestCaseResult {
    pub id: Uuid,
    pub test_case_id: i64,
    pub submission_id: i64,
    pub created_at: DateTime<Utc>,

    pub return_code: Option<i32>,
    #[serde(default)]
    pub standard_output: String,
    #[serde(default)]
    pub standard_error_output: String,
    #[serde(default)]
    pub timed_out: bool,

    pub valgrind_return_code: Option<i32>,
    #[serde(default)]
    pub valgrind_output: String,

    pub compilation_return_code: Option<i32>,
    #[serde(default)]
    pub compilation_standard_output: String,
    #[serde(default)]
    pub compilation_standard_error_output: String,
}

impl TestCaseResult {
    /// An empty result row with a fresh id.
    pub fn new(test_case_id: i64, submission_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_case_id,
            submission_id,
            created_at: Utc::now(),
            return_code: None,
            standard_output: String::new(),
            standard_error_output: String::new(),
            timed_out: false,
            valgrind_return_code: None,
            valgrind_output: String::new(),
            compilation_return_code: None,
            compilation_standard_output: String::new(),
            compilation_standard_error_output: String::new(),
        }
    }

    pub fn compilation_succeeded(&self) -> bool {
        self.compilation_return_code == Some(0)
    }

    /// Valgrind reports errors through its own exit status.
    pub fn valgrind_errors_present(&self) -> bool {
        matches!(self.valgrind_return_code, Some(rc) if rc != 0)
    }

    pub fn return_code_correct(&self, base: &TestCaseBase) -> bool {
        base.return_code_correct(self.return_code)
    }

    pub fn standard_output_correct(&self, base: &TestCaseBase) -> bool {
        !base.checks_stdout() || self.standard_output == base.expected_standard_output
    }

    pub fn standard_error_output_correct(&self, base: &TestCaseBase) -> bool {
        !base.checks_stderr() || self.standard_error_output == base.expected_standard_error_output
    }

    pub fn output_correct(&self, base: &TestCaseBase) -> bool {
        self.standard_output_correct(base) && self.standard_error_output_correct(base)
    }
}

/// One candidate student test checked against the suite's implementations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct StudentTestCaseEvaluation {
    pub student_test_case_name: String,

    pub compilation_return_code: Option<i32>,
    #[serde(default)]
    pub compilation_standard_output: String,
    #[serde(default)]
    pub compilation_standard_error_output: String,

    /// Exited 0 within the time limit against the correct implementation.
    pub valid: bool,
    #[serde(default)]
    pub validity_check_standard_output: String,
    #[serde(default)]
    pub validity_check_standard_error_output: String,
    #[serde(default)]
    pub timed_out: bool,

    /// Buggy implementations this test exposed that no earlier test had.
    #[serde(default)]
    pub buggy_implementations_exposed: Vec<String>,
}

impl StudentTestCaseEvaluation {
    pub fn new(student_test_case_name: impl Into<String>) -> Self {
        Self {
            student_test_case_name: student_test_case_name.into(),
            ..Default::default()
        }
    }

    /// `None` when compilation was skipped.
    pub fn compilation_succeeded(&self) -> Option<bool> {
        self.compilation_return_code.map(|rc| rc == 0)
    }
}

/// Outcome of one student test suite for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StudentSuiteResult {
    pub id: Uuid,
    pub student_test_suite_id: i64,
    pub submission_id: i64,
    pub created_at: DateTime<Utc>,
    /// Union over all candidates, in discovery order.
    #[serde(default)]
    pub buggy_implementations_exposed: Vec<String>,
    #[serde(default)]
    pub detailed_results: Vec<StudentTestCaseEvaluation>,
}

impl StudentSuiteResult {
    pub fn new(student_test_suite_id: i64, submission_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_test_suite_id,
            submission_id,
            created_at: Utc::now(),
            buggy_implementations_exposed: Vec::new(),
            detailed_results: Vec::new(),
        }
    }

    /// Points per exposed bug times bugs exposed; never negative, and at
    /// most the number of declared buggy implementations can count.
    pub fn points_awarded(&self, suite: &StudentTestSuite) -> u32 {
        let exposed = self
            .buggy_implementations_exposed
            .iter()
            .filter(|name| suite.buggy_implementation_filenames.contains(name))
            .count() as u32;
        suite
            .points_per_buggy_implementation_exposed
            .saturating_mul(exposed)
    }
}
