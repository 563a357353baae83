//! Mutation testing of student-written tests.
//!
//! Each candidate test is built against the correct implementation first.
//! Only candidates that pass there are run against the buggy
//! implementations, and a buggy implementation counts as exposed when the
//! candidate fails against it.

use std::slice;
use util::execution_config::ResourceLimits;

use db::models::{StudentSuiteResult, StudentTestCaseEvaluation, StudentTestSuite};

use crate::error::ExecutionResult;
use crate::executor::Executor;
use crate::files::GradingFiles;
use crate::sandbox::{CommandRequest, CompletedCommand, Sandbox, SandboxScope};

pub const EXECUTABLE_NAME: &str = "prog";

/// Build and run output of one candidate against one implementation.
struct PairRun {
    compile: CompletedCommand,
    /// `None` when compilation failed.
    run: Option<CompletedCommand>,
}

impl Executor {
    pub async fn evaluate_student_suite(
        &self,
        sandbox: &mut dyn Sandbox,
        suite: &StudentTestSuite,
        files: &GradingFiles,
        submission_id: i64,
    ) -> ExecutionResult<StudentSuiteResult> {
        suite.validate(&files.project_files)?;

        let mut candidates = files.matching_student_files(
            "student_test_case_filename_pattern",
            slice::from_ref(&suite.student_test_case_filename_pattern),
        )?;
        candidates.sort();

        let mut result = StudentSuiteResult::new(suite.id, submission_id);
        for candidate in &candidates {
            let evaluation = self
                .evaluate_candidate(sandbox, suite, files, candidate, &result.buggy_implementations_exposed)
                .await?;
            for exposed in &evaluation.buggy_implementations_exposed {
                if !result.buggy_implementations_exposed.contains(exposed) {
                    result.buggy_implementations_exposed.push(exposed.clone());
                }
            }
            result.detailed_results.push(evaluation);
        }

        tracing::debug!(
            student_suite_id = suite.id,
            submission_id,
            candidates = candidates.len(),
            exposed = result.buggy_implementations_exposed.len(),
            "evaluated student suite {}",
            suite.name
        );
        Ok(result)
    }

    async fn evaluate_candidate(
        &self,
        sandbox: &mut dyn Sandbox,
        suite: &StudentTestSuite,
        files: &GradingFiles,
        candidate: &str,
        exposed_so_far: &[String],
    ) -> ExecutionResult<StudentTestCaseEvaluation> {
        let mut evaluation = StudentTestCaseEvaluation::new(candidate);

        let mut scope = SandboxScope::open(sandbox);
        let outcome = self
            .build_and_run(&mut *scope, suite, files, candidate, &suite.correct_implementation_filename)
            .await;
        let validity = scope.close(outcome).await?;

        evaluation.compilation_return_code = validity.compile.return_code;
        evaluation.compilation_standard_output = self.truncate(validity.compile.stdout);
        evaluation.compilation_standard_error_output = self.truncate(validity.compile.stderr);
        evaluation.timed_out = validity.compile.timed_out;

        let Some(run) = validity.run else {
            return Ok(evaluation);
        };
        evaluation.valid = run.succeeded();
        evaluation.validity_check_standard_output = self.truncate(run.stdout);
        evaluation.validity_check_standard_error_output = self.truncate(run.stderr);
        evaluation.timed_out = run.timed_out;
        if !evaluation.valid {
            return Ok(evaluation);
        }

        for buggy in &suite.buggy_implementation_filenames {
            if exposed_so_far.contains(buggy)
                || evaluation.buggy_implementations_exposed.contains(buggy)
            {
                continue;
            }
            let mut scope = SandboxScope::open(sandbox);
            let outcome = self.build_and_run(&mut *scope, suite, files, candidate, buggy).await;
            let pair = scope.close(outcome).await?;

            // A buggy implementation that does not build exposes nothing.
            if let Some(run) = pair.run {
                if run.return_code != Some(0) {
                    evaluation.buggy_implementations_exposed.push(buggy.clone());
                }
            }
        }
        Ok(evaluation)
    }

    /// Stages `candidate`, the suite resources and `implementation` (under
    /// its staged name), compiles them together and runs the result.
    async fn build_and_run(
        &self,
        sandbox: &mut dyn Sandbox,
        suite: &StudentTestSuite,
        files: &GradingFiles,
        candidate: &str,
        implementation: &str,
    ) -> ExecutionResult<PairRun> {
        sandbox.add_files(&[files.student_file(candidate)?]).await?;
        sandbox
            .add_files(&files.project_file_paths(&suite.suite_resource_filenames)?)
            .await?;
        let staged_name = suite.staged_implementation_name(implementation);
        sandbox
            .add_and_rename_file(&files.project_file(implementation)?, staged_name)
            .await?;

        let limits = ResourceLimits::default().with_time_limit(suite.time_limit);

        let mut argv = vec![suite.compiler.executable().to_string()];
        argv.extend(suite.compiler_flags.iter().cloned());
        argv.extend(suite.suite_resource_files_to_compile_together.iter().cloned());
        argv.push(candidate.to_string());
        if suite.compile_implementation_files {
            argv.push(staged_name.to_string());
        }
        argv.push("-o".into());
        argv.push(EXECUTABLE_NAME.into());

        let compile = sandbox
            .run_command(CommandRequest::new(argv).with_limits(limits.for_compilation()))
            .await?;
        if !compile.succeeded() {
            return Ok(PairRun { compile, run: None });
        }

        let run = sandbox
            .run_command(CommandRequest::new([format!("./{EXECUTABLE_NAME}")]).with_limits(limits))
            .await?;
        Ok(PairRun {
            compile,
            run: Some(run),
        })
    }
}
