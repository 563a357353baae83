//! The isolated environment commands run in.
//!
//! Executors only ever talk to the [`Sandbox`] trait. [`docker::DockerSandbox`]
//! is the production backend and [`scripted::ScriptedSandbox`] answers
//! commands from a closure so the grading logic can be tested without one.

pub mod docker;
pub mod scripted;

use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use util::execution_config::ResourceLimits;

use crate::error::SandboxError;

/// One command to run inside a sandbox.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub argv: Vec<String>,
    pub limits: ResourceLimits,
    pub stdin: Option<String>,
    pub allow_network: bool,
}

impl CommandRequest {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            limits: ResourceLimits::default(),
            stdin: None,
            allow_network: false,
        }
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Empty input is the same as no input.
    pub fn with_stdin(mut self, stdin: &str) -> Self {
        self.stdin = (!stdin.is_empty()).then(|| stdin.to_string());
        self
    }

    pub fn with_network(mut self, allow: bool) -> Self {
        self.allow_network = allow;
        self
    }
}

/// What a finished (or killed) command left behind.
///
/// `return_code` is `None` when the command was killed for running past its
/// time limit; whatever it printed before that is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedCommand {
    pub stdout: String,
    pub stderr: String,
    pub return_code: Option<i32>,
    pub timed_out: bool,
}

impl CompletedCommand {
    pub fn exited(return_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            return_code: Some(return_code),
            timed_out: false,
        }
    }

    pub fn timed_out(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            return_code: None,
            timed_out: true,
        }
    }

    /// Exited 0 within its time limit.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.return_code == Some(0)
    }
}

#[async_trait]
pub trait Sandbox: Send {
    /// Identifies the sandbox in logs.
    fn name(&self) -> &str;

    /// Copies files into the sandbox working directory under their own names.
    async fn add_files(&mut self, files: &[PathBuf]) -> Result<(), SandboxError>;

    /// Copies one file into the working directory as `dest_name`.
    async fn add_and_rename_file(&mut self, file: &Path, dest_name: &str)
    -> Result<(), SandboxError>;

    async fn run_command(
        &mut self,
        request: CommandRequest,
    ) -> Result<CompletedCommand, SandboxError>;

    /// Discards every file and build product in the working directory.
    async fn reset(&mut self) -> Result<(), SandboxError>;
}

/// Builds one sandbox per worker.
pub trait SandboxFactory: Send + Sync {
    fn create(&self, name: String) -> Box<dyn Sandbox>;
}

/// Exclusive use of a sandbox that ends with a reset.
///
/// Derefs to the sandbox. [`SandboxScope::close`] resets it whatever the
/// outcome of the work done inside, so callers write the body as a separate
/// function and hand its result to `close`; early returns in the body
/// cannot skip the reset.
pub struct SandboxScope<'a> {
    sandbox: &'a mut dyn Sandbox,
}

impl<'a> SandboxScope<'a> {
    pub fn open(sandbox: &'a mut dyn Sandbox) -> Self {
        Self { sandbox }
    }

    /// Resets the sandbox and returns `outcome`. A failed reset only
    /// surfaces when the work itself succeeded.
    pub async fn close<T, E>(self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<SandboxError>,
    {
        let reset = self.sandbox.reset().await;
        let value = outcome?;
        reset?;
        Ok(value)
    }
}

impl<'a> Deref for SandboxScope<'a> {
    type Target = dyn Sandbox + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.sandbox
    }
}

impl<'a> DerefMut for SandboxScope<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.sandbox
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedSandbox;
    use super::*;
    use crate::error::ExecutionError;

    async fn fails_halfway(sandbox: &mut dyn Sandbox) -> Result<u32, ExecutionError> {
        sandbox.run_command(CommandRequest::new(["true"])).await?;
        Err(SandboxError::Unavailable("gone".into()).into())
    }

    #[tokio::test]
    async fn scope_resets_on_error() {
        let mut sandbox = ScriptedSandbox::new(|_| Ok(CompletedCommand::exited(0, "", "")));
        let resets = sandbox.reset_counter();

        let mut scope = SandboxScope::open(&mut sandbox);
        let outcome = fails_halfway(&mut *scope).await;
        assert!(scope.close(outcome).await.is_err());
        assert_eq!(resets.get(), 1);
    }

    #[test]
    fn empty_stdin_is_no_stdin() {
        let request = CommandRequest::new(["./prog"]).with_stdin("");
        assert_eq!(request.stdin, None);
        let request = request.with_stdin("1 2\n");
        assert_eq!(request.stdin.as_deref(), Some("1 2\n"));
    }
}
