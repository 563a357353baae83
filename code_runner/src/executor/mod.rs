//! Turns an instructor test case into a [`TestCaseResult`].
//!
//! Wrong output, nonzero exits, failed compiles and timeouts are all
//! recorded in the result. Only sandbox failures, bad specs and missing
//! files come back as errors, and the scheduler decides what to do with
//! those.

mod compiled;
mod interpreted;

use std::path::PathBuf;
use util::config::AppConfig;
use util::execution_config::truncate_output;

use db::models::{AgTestCase, TestCaseBase, TestCaseKind, TestCaseResult};

use crate::error::ExecutionResult;
use crate::files::GradingFiles;
use crate::sandbox::{CommandRequest, Sandbox, SandboxScope};

pub use compiled::compile_command;

/// Runs test cases and student suites. Holds only settings, so one value
/// can be shared by every worker.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    max_output_length: usize,
}

impl Executor {
    pub fn new(max_output_length: usize) -> Self {
        Self { max_output_length }
    }

    pub fn from_config() -> Self {
        Self::new(AppConfig::global().max_output_length)
    }

    pub(crate) fn truncate(&self, output: String) -> String {
        truncate_output(output, self.max_output_length)
    }

    /// Runs one test case against one submission.
    ///
    /// The sandbox is reset afterwards on every path, including errors.
    pub async fn run_test_case(
        &self,
        sandbox: &mut dyn Sandbox,
        case: &AgTestCase,
        files: &GradingFiles,
        submission_id: i64,
    ) -> ExecutionResult<TestCaseResult> {
        case.validate(&files.project_files)?;
        tracing::debug!(
            test_case_id = case.id,
            submission_id,
            sandbox = sandbox.name(),
            "running test case {}",
            case.base.name
        );

        let mut scope = SandboxScope::open(sandbox);
        let outcome = self.execute(&mut *scope, case, files, submission_id).await;
        scope.close(outcome).await
    }

    async fn execute(
        &self,
        sandbox: &mut dyn Sandbox,
        case: &AgTestCase,
        files: &GradingFiles,
        submission_id: i64,
    ) -> ExecutionResult<TestCaseResult> {
        stage_resource_files(sandbox, &case.base, files).await?;

        let mut result = TestCaseResult::new(case.id, submission_id);
        match &case.kind {
            TestCaseKind::CompilationOnly(program) => {
                self.compile(sandbox, &case.base, program, files, &mut result)
                    .await?;
            }
            TestCaseKind::CompiledAndRun(program) => {
                self.compile_and_run(sandbox, &case.base, program, files, &mut result)
                    .await?;
            }
            TestCaseKind::Interpreted(program) => {
                self.interpret(sandbox, &case.base, program, &mut result)
                    .await?;
            }
        }
        Ok(result)
    }

    /// Runs the program under test and records what it did.
    async fn run_program(
        &self,
        sandbox: &mut dyn Sandbox,
        base: &TestCaseBase,
        argv: Vec<String>,
        result: &mut TestCaseResult,
    ) -> ExecutionResult<()> {
        let request = CommandRequest::new(argv)
            .with_limits(base.limits)
            .with_stdin(&base.standard_input)
            .with_network(base.allow_network_connections);
        let output = sandbox.run_command(request).await?;

        result.return_code = output.return_code;
        result.standard_output = self.truncate(output.stdout);
        result.standard_error_output = self.truncate(output.stderr);
        result.timed_out = output.timed_out;
        Ok(())
    }
}

/// Copies the test's project resource files and matching student files into
/// the sandbox.
async fn stage_resource_files(
    sandbox: &mut dyn Sandbox,
    base: &TestCaseBase,
    files: &GradingFiles,
) -> ExecutionResult<()> {
    let project = files.project_file_paths(&base.test_resource_files)?;
    sandbox.add_files(&project).await?;

    let student = student_paths(
        files,
        &files.matching_student_files("student_resource_files", &base.student_resource_files)?,
    )?;
    sandbox.add_files(&student).await?;
    Ok(())
}

fn student_paths(files: &GradingFiles, names: &[String]) -> ExecutionResult<Vec<PathBuf>> {
    names.iter().map(|n| files.student_file(n)).collect()
}

/// `name args...`, the argv of a program launched from the working
/// directory.
fn with_arguments(program: String, arguments: &[String]) -> Vec<String> {
    std::iter::once(program)
        .chain(arguments.iter().cloned())
        .collect()
}
