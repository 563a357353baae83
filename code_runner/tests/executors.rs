use code_runner::sandbox::scripted::{ScriptedCall, ScriptedSandbox};
use code_runner::{CompletedCommand, ExecutionError, Executor, GradingFiles, SandboxError};
use db::models::{AgTestCase, CompiledProgram, InterpretedProgram, TestCaseBase, TestCaseKind};
use tempfile::TempDir;
use util::languages::Interpreter;
use util::test_helpers::write_files;

struct Fixture {
    _dir: TempDir,
    files: GradingFiles,
}

fn fixture(project: &[(&str, &str)], submitted: &[(&str, &str)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let project_dir = dir.path().join("project_files");
    let submission_dir = dir.path().join("submission");
    write_files(&project_dir, project);
    write_files(&submission_dir, submitted);
    Fixture {
        files: GradingFiles {
            project_files_dir: project_dir,
            project_files: project.iter().map(|(n, _)| n.to_string()).collect(),
            submission_dir,
            submitted_filenames: submitted.iter().map(|(n, _)| n.to_string()).collect(),
        },
        _dir: dir,
    }
}

fn compiled(base: TestCaseBase, compile_only: bool) -> AgTestCase {
    let program = CompiledProgram {
        compiler: Default::default(),
        compiler_flags: vec!["-Wall".into()],
        project_files_to_compile_together: vec!["main.cpp".into()],
        student_files_to_compile_together: vec!["*.cpp".into()],
        executable_name: "prog".into(),
    };
    AgTestCase {
        id: 3,
        suite_id: 1,
        base,
        kind: if compile_only {
            TestCaseKind::CompilationOnly(program)
        } else {
            TestCaseKind::CompiledAndRun(program)
        },
    }
}

fn cpp_fixture() -> Fixture {
    fixture(&[("main.cpp", "int main();")], &[("list.cpp", "//"), ("README", "")])
}

#[tokio::test]
async fn failed_compile_short_circuits() {
    let fx = cpp_fixture();
    let mut sandbox = ScriptedSandbox::new(|call| {
        Ok(match call.program() {
            "g++" => CompletedCommand::exited(2, "", "list.cpp:1: error"),
            _ => CompletedCommand::exited(0, "ran", ""),
        })
    });
    let log = sandbox.call_log();
    let resets = sandbox.reset_counter();

    let result = Executor::new(1000)
        .run_test_case(&mut sandbox, &compiled(TestCaseBase::new("t"), false), &fx.files, 9)
        .await
        .unwrap();

    assert_eq!(result.compilation_return_code, Some(2));
    assert!(!result.compilation_succeeded());
    assert_eq!(result.compilation_standard_error_output, "list.cpp:1: error");
    assert_eq!(result.return_code, None);
    assert!(result.standard_output.is_empty());
    assert!(!result.timed_out);
    assert_eq!(result.submission_id, 9);
    assert_eq!(log.len(), 1);
    assert_eq!(resets.get(), 1);
}

#[tokio::test]
async fn compile_command_stages_and_names_matching_student_files() {
    let fx = cpp_fixture();
    let mut sandbox = ScriptedSandbox::new(|_| Ok(CompletedCommand::exited(0, "", "")));
    let log = sandbox.call_log();

    Executor::new(1000)
        .run_test_case(&mut sandbox, &compiled(TestCaseBase::new("t"), true), &fx.files, 1)
        .await
        .unwrap();

    let calls = log.calls();
    assert_eq!(calls.len(), 1, "compile-only tests never run the program");
    assert_eq!(calls[0].argv, ["g++", "-Wall", "main.cpp", "list.cpp", "-o", "prog"]);
    assert!(calls[0].is_staged("main.cpp"));
    assert!(calls[0].is_staged("list.cpp"));
    assert!(!calls[0].is_staged("README"));
}

#[tokio::test]
async fn run_and_valgrind_share_arguments_and_input() {
    let fx = cpp_fixture();
    let mut base = TestCaseBase::new("t");
    base.command_line_arguments = vec!["-n".into(), "3".into()];
    base.standard_input = "1 2 3\n".into();
    base.expected_standard_output = "6\n".into();
    base.use_valgrind = true;

    let mut sandbox = ScriptedSandbox::new(|call: &ScriptedCall| {
        Ok(match call.program() {
            "g++" => CompletedCommand::exited(0, "", ""),
            "./prog" => CompletedCommand::exited(0, "6\n", ""),
            "valgrind" => CompletedCommand::exited(1, "6\n", "==1== Invalid read"),
            other => panic!("unexpected command {other}"),
        })
    });
    let log = sandbox.call_log();

    let result = Executor::new(1000)
        .run_test_case(&mut sandbox, &compiled(base.clone(), false), &fx.files, 1)
        .await
        .unwrap();

    let calls = log.calls();
    assert_eq!(calls[1].argv, ["./prog", "-n", "3"]);
    assert_eq!(calls[1].stdin.as_deref(), Some("1 2 3\n"));
    assert_eq!(
        calls[2].argv,
        ["valgrind", "--leak-check=full", "--error-exitcode=1", "./prog", "-n", "3"]
    );
    assert_eq!(calls[2].stdin.as_deref(), Some("1 2 3\n"));

    assert_eq!(result.return_code, Some(0));
    assert!(result.output_correct(&base));
    assert_eq!(result.valgrind_return_code, Some(1));
    assert_eq!(result.valgrind_output, "==1== Invalid read");
    assert!(result.valgrind_errors_present());
}

#[tokio::test]
async fn compile_timeout_reports_only_the_compile_phase() {
    let fx = cpp_fixture();
    let mut sandbox = ScriptedSandbox::new(|_| Ok(CompletedCommand::timed_out("", "cc1plus")));

    let result = Executor::new(1000)
        .run_test_case(&mut sandbox, &compiled(TestCaseBase::new("t"), false), &fx.files, 1)
        .await
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.compilation_return_code, None);
    assert_eq!(result.return_code, None);
}

#[tokio::test]
async fn interpreted_timeout_keeps_partial_output() {
    let fx = fixture(&[("data.txt", "x")], &[("main.py", "print(1)")]);
    let mut base = TestCaseBase::new("py");
    base.test_resource_files = vec!["data.txt".into()];
    base.student_resource_files = vec!["main.py".into()];
    base.command_line_arguments = vec!["data.txt".into()];
    let case = AgTestCase {
        id: 4,
        suite_id: 1,
        base,
        kind: TestCaseKind::Interpreted(InterpretedProgram {
            interpreter: Interpreter::Python3,
            interpreter_flags: vec!["-B".into()],
            entry_point_filename: "main.py".into(),
        }),
    };

    let mut sandbox = ScriptedSandbox::new(|call| {
        assert!(call.is_staged("main.py") && call.is_staged("data.txt"));
        Ok(CompletedCommand::timed_out("partial", ""))
    });
    let log = sandbox.call_log();

    let result = Executor::new(1000)
        .run_test_case(&mut sandbox, &case, &fx.files, 1)
        .await
        .unwrap();

    assert_eq!(log.calls()[0].argv, ["python3", "-B", "main.py", "data.txt"]);
    assert!(result.timed_out);
    assert_eq!(result.return_code, None);
    assert_eq!(result.standard_output, "partial");
    assert_eq!(result.compilation_return_code, None);
}

#[tokio::test]
async fn sandbox_failures_propagate_and_still_reset() {
    let fx = cpp_fixture();
    let mut sandbox = ScriptedSandbox::new(|call| match call.program() {
        "g++" => Ok(CompletedCommand::exited(0, "", "")),
        _ => Err(SandboxError::Unavailable("daemon restarting".into())),
    });
    let resets = sandbox.reset_counter();

    let err = Executor::new(1000)
        .run_test_case(&mut sandbox, &compiled(TestCaseBase::new("t"), false), &fx.files, 1)
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(resets.get(), 1);
    assert!(sandbox.staged_names().is_empty());
}

#[tokio::test]
async fn missing_project_file_is_not_transient() {
    let fx = cpp_fixture();
    std::fs::remove_file(fx.files.project_files_dir.join("main.cpp")).unwrap();
    let mut sandbox = ScriptedSandbox::new(|_| Ok(CompletedCommand::exited(0, "", "")));
    let log = sandbox.call_log();

    let err = Executor::new(1000)
        .run_test_case(&mut sandbox, &compiled(TestCaseBase::new("t"), false), &fx.files, 1)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::MissingFile { .. }));
    assert!(!err.is_transient());
    assert!(log.is_empty());
}

#[tokio::test]
async fn invalid_spec_is_rejected_before_running() {
    let fx = cpp_fixture();
    let mut base = TestCaseBase::new("t");
    base.command_line_arguments = vec!["; rm -rf /".into()];
    let mut sandbox = ScriptedSandbox::new(|_| Ok(CompletedCommand::exited(0, "", "")));
    let log = sandbox.call_log();

    let err = Executor::new(1000)
        .run_test_case(&mut sandbox, &compiled(base, false), &fx.files, 1)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Validation(_)));
    assert!(log.is_empty());
}

#[tokio::test]
async fn long_output_is_truncated() {
    let fx = cpp_fixture();
    let mut sandbox = ScriptedSandbox::new(|call| {
        Ok(match call.program() {
            "./prog" => CompletedCommand::exited(0, "abcdefghij", ""),
            _ => CompletedCommand::exited(0, "", ""),
        })
    });

    let result = Executor::new(4)
        .run_test_case(&mut sandbox, &compiled(TestCaseBase::new("t"), false), &fx.files, 1)
        .await
        .unwrap();

    assert_eq!(result.standard_output, "abcd\nOutput truncated");
}
