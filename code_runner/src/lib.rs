//! Sandboxed execution of instructor test cases and student test suites.

pub mod error;
pub mod executor;
pub mod files;
pub mod sandbox;
pub mod student_suite;

pub use error::{ExecutionError, ExecutionResult, SandboxError};
pub use executor::Executor;
pub use files::GradingFiles;
pub use sandbox::{CommandRequest, CompletedCommand, Sandbox, SandboxFactory, SandboxScope};
