use db::models::{CompiledProgram, TestCaseBase, TestCaseResult};

use super::{Executor, student_paths, with_arguments};
use crate::error::ExecutionResult;
use crate::files::GradingFiles;
use crate::sandbox::{CommandRequest, Sandbox};

/// `compiler flags... project_files... student_files... -o executable`
pub fn compile_command(program: &CompiledProgram, student_files: &[String]) -> Vec<String> {
    let mut argv = vec![program.compiler.executable().to_string()];
    argv.extend(program.compiler_flags.iter().cloned());
    argv.extend(program.project_files_to_compile_together.iter().cloned());
    argv.extend(student_files.iter().cloned());
    argv.push("-o".into());
    argv.push(program.executable_name.clone());
    argv
}

impl Executor {
    /// Stages and compiles the program. Returns whether the build
    /// succeeded; the compiler's output lands in `result` either way.
    pub(super) async fn compile(
        &self,
        sandbox: &mut dyn Sandbox,
        base: &TestCaseBase,
        program: &CompiledProgram,
        files: &GradingFiles,
        result: &mut TestCaseResult,
    ) -> ExecutionResult<bool> {
        let project = files.project_file_paths(&program.project_files_to_compile_together)?;
        sandbox.add_files(&project).await?;

        let student_files = files.matching_student_files(
            "student_files_to_compile_together",
            &program.student_files_to_compile_together,
        )?;
        sandbox.add_files(&student_paths(files, &student_files)?).await?;

        let request = CommandRequest::new(compile_command(program, &student_files))
            .with_limits(base.limits.for_compilation());
        let output = sandbox.run_command(request).await?;

        let succeeded = output.succeeded();
        result.compilation_return_code = output.return_code;
        result.compilation_standard_output = self.truncate(output.stdout);
        result.compilation_standard_error_output = self.truncate(output.stderr);
        result.timed_out = output.timed_out;
        Ok(succeeded)
    }

    pub(super) async fn compile_and_run(
        &self,
        sandbox: &mut dyn Sandbox,
        base: &TestCaseBase,
        program: &CompiledProgram,
        files: &GradingFiles,
        result: &mut TestCaseResult,
    ) -> ExecutionResult<()> {
        if !self.compile(sandbox, base, program, files, result).await? {
            return Ok(());
        }

        let argv = with_arguments(
            format!("./{}", program.executable_name),
            &base.command_line_arguments,
        );
        self.run_program(sandbox, base, argv.clone(), result).await?;

        if base.use_valgrind {
            let mut valgrind = vec!["valgrind".to_string()];
            valgrind.extend(base.effective_valgrind_flags());
            valgrind.extend(argv);

            let request = CommandRequest::new(valgrind)
                .with_limits(base.limits)
                .with_stdin(&base.standard_input)
                .with_network(base.allow_network_connections);
            let output = sandbox.run_command(request).await?;
            result.valgrind_return_code = output.return_code;
            result.valgrind_output = self.truncate(output.stderr);
        }
        Ok(())
    }
}
