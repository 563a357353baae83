use db::models::{InterpretedProgram, TestCaseBase, TestCaseResult};

use super::{Executor, with_arguments};
use crate::error::ExecutionResult;
use crate::sandbox::Sandbox;

impl Executor {
    /// `interpreter flags... entry_point args...`. The entry point is one of
    /// the resource files already staged.
    pub(super) async fn interpret(
        &self,
        sandbox: &mut dyn Sandbox,
        base: &TestCaseBase,
        program: &InterpretedProgram,
        result: &mut TestCaseResult,
    ) -> ExecutionResult<()> {
        let mut argv = vec![program.interpreter.executable().to_string()];
        argv.extend(program.interpreter_flags.iter().cloned());
        argv.extend(with_arguments(
            program.entry_point_filename.clone(),
            &base.command_line_arguments,
        ));
        self.run_program(sandbox, base, argv, result).await
    }
}
