//! Instructor test cases.
//!
//! Every test case shares [`TestCaseBase`] (command, expectations, points,
//! limits, feedback) and carries one [`TestCaseKind`] describing how the
//! program under test is produced and launched.

use serde::{Deserialize, Serialize};
use util::execution_config::{ResourceLimits, default_valgrind_flags};
use util::languages::{Compiler, Interpreter};
use util::validation::{first_illegal_arg, is_legal_filename};
use validator::Validate;

use crate::error::ValidationError;
use crate::models::feedback_config::FeedbackConfiguration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TestCaseBase {
    pub name: String,
    #[serde(default)]
    pub command_line_arguments: Vec<String>,
    #[serde(default)]
    pub standard_input: String,
    /// Project files copied into the sandbox.
    #[serde(default)]
    pub test_resource_files: Vec<String>,
    /// Glob patterns matched against the submitted filenames.
    #[serde(default)]
    pub student_resource_files: Vec<String>,
    #[serde(flatten)]
    pub limits: ResourceLimits,
    #[serde(default)]
    pub allow_network_connections: bool,

    #[serde(default)]
    pub expected_return_code: Option<i32>,
    /// When set, any nonzero exit is correct and `expected_return_code` is ignored.
    #[serde(default)]
    pub expect_any_nonzero_return_code: bool,
    /// Empty means stdout is not checked.
    #[serde(default)]
    pub expected_standard_output: String,
    /// Empty means stderr is not checked.
    #[serde(default)]
    pub expected_standard_error_output: String,

    #[serde(default)]
    pub use_valgrind: bool,
    #[serde(default)]
    pub valgrind_flags: Option<Vec<String>>,

    #[serde(default)]
    pub points_for_correct_return_code: u32,
    #[serde(default)]
    pub points_for_correct_output: u32,
    #[serde(default)]
    pub deduction_for_valgrind_errors: u32,
    #[serde(default)]
    pub points_for_compilation_success: u32,

    #[serde(default)]
    pub feedback_configuration: FeedbackConfiguration,
    #[serde(default)]
    pub post_deadline_final_submission_feedback_configuration: Option<FeedbackConfiguration>,
}

impl TestCaseBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command_line_arguments: Vec::new(),
            standard_input: String::new(),
            test_resource_files: Vec::new(),
            student_resource_files: Vec::new(),
            limits: ResourceLimits::default(),
            allow_network_connections: false,
            expected_return_code: None,
            expect_any_nonzero_return_code: false,
            expected_standard_output: String::new(),
            expected_standard_error_output: String::new(),
            use_valgrind: false,
            valgrind_flags: None,
            points_for_correct_return_code: 0,
            points_for_correct_output: 0,
            deduction_for_valgrind_errors: 0,
            points_for_compilation_success: 0,
            feedback_configuration: FeedbackConfiguration::default(),
            post_deadline_final_submission_feedback_configuration: None,
        }
    }

    pub fn checks_return_code(&self) -> bool {
        self.expected_return_code.is_some() || self.expect_any_nonzero_return_code
    }

    pub fn checks_stdout(&self) -> bool {
        !self.expected_standard_output.is_empty()
    }

    pub fn checks_stderr(&self) -> bool {
        !self.expected_standard_error_output.is_empty()
    }

    pub fn checks_output(&self) -> bool {
        self.checks_stdout() || self.checks_stderr()
    }

    /// Correctness of an observed exit status. A missing status (the program
    /// never ran to completion) is never correct.
    pub fn return_code_correct(&self, return_code: Option<i32>) -> bool {
        match return_code {
            None => false,
            Some(rc) if self.expect_any_nonzero_return_code => rc != 0,
            Some(rc) => self.expected_return_code == Some(rc),
        }
    }

    pub fn effective_valgrind_flags(&self) -> Vec<String> {
        self.valgrind_flags
            .clone()
            .unwrap_or_else(default_valgrind_flags)
    }

    fn validate(&self, project_files: &[String]) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "test case name must not be empty"));
        }
        if let Err(errors) = self.limits.validate() {
            return Err(ValidationError::new(
                "limits",
                common::format_validation_errors(&errors),
            ));
        }
        if let Some(arg) = first_illegal_arg(&self.command_line_arguments) {
            return Err(ValidationError::new(
                "command_line_arguments",
                format!("illegal argument {arg:?}"),
            ));
        }
        if let Some(flags) = &self.valgrind_flags {
            if let Some(flag) = first_illegal_arg(flags) {
                return Err(ValidationError::new(
                    "valgrind_flags",
                    format!("illegal flag {flag:?}"),
                ));
            }
        }
        check_project_files("test_resource_files", &self.test_resource_files, project_files)
    }
}

/// How the program under test is built (if at all) and launched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompiledProgram {
    #[serde(default)]
    pub compiler: Compiler,
    #[serde(default)]
    pub compiler_flags: Vec<String>,
    #[serde(default)]
    pub project_files_to_compile_together: Vec<String>,
    /// Glob patterns matched against the submitted filenames.
    #[serde(default)]
    pub student_files_to_compile_together: Vec<String>,
    pub executable_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InterpretedProgram {
    pub interpreter: Interpreter,
    #[serde(default)]
    pub interpreter_flags: Vec<String>,
    pub entry_point_filename: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestCaseKind {
    /// Only the compiler runs; the result carries compilation data alone.
    CompilationOnly(CompiledProgram),
    CompiledAndRun(CompiledProgram),
    Interpreted(InterpretedProgram),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgTestCase {
    pub id: i64,
    pub suite_id: i64,
    #[serde(flatten)]
    pub base: TestCaseBase,
    pub kind: TestCaseKind,
}

impl AgTestCase {
    pub fn checks_compilation(&self) -> bool {
        matches!(
            self.kind,
            TestCaseKind::CompilationOnly(_) | TestCaseKind::CompiledAndRun(_)
        )
    }

    /// Checks everything that can be checked without running anything.
    pub fn validate(&self, project_files: &[String]) -> Result<(), ValidationError> {
        self.base.validate(project_files)?;

        match &self.kind {
            TestCaseKind::CompilationOnly(program) | TestCaseKind::CompiledAndRun(program) => {
                if !is_legal_filename(&program.executable_name) {
                    return Err(ValidationError::new(
                        "executable_name",
                        format!("{:?} is not a legal filename", program.executable_name),
                    ));
                }
                if let Some(flag) = first_illegal_arg(&program.compiler_flags) {
                    return Err(ValidationError::new(
                        "compiler_flags",
                        format!("illegal flag {flag:?}"),
                    ));
                }
                check_project_files(
                    "project_files_to_compile_together",
                    &program.project_files_to_compile_together,
                    project_files,
                )
            }
            TestCaseKind::Interpreted(program) => {
                if let Some(flag) = first_illegal_arg(&program.interpreter_flags) {
                    return Err(ValidationError::new(
                        "interpreter_flags",
                        format!("illegal flag {flag:?}"),
                    ));
                }
                let entry = &program.entry_point_filename;
                let staged = self.base.test_resource_files.contains(entry)
                    || self.base.student_resource_files.contains(entry);
                if !staged {
                    return Err(ValidationError::new(
                        "entry_point_filename",
                        format!("{entry:?} is not one of the test's resource files"),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Every name must be a legal filename and one of the project's files.
pub(crate) fn check_project_files(
    field: &str,
    names: &[String],
    project_files: &[String],
) -> Result<(), ValidationError> {
    for name in names {
        if !is_legal_filename(name) {
            return Err(ValidationError::new(
                field,
                format!("{name:?} is not a legal filename"),
            ));
        }
        if !project_files.contains(name) {
            return Err(ValidationError::new(
                field,
                format!("{name:?} is not a project file"),
            ));
        }
    }
    Ok(())
}
