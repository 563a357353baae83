use db::ValidationError;
use std::path::PathBuf;

/// A failure of the sandbox itself rather than of the program inside it.
///
/// Always worth retrying: the same command may well succeed on a fresh
/// attempt.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to launch sandbox: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("invalid test specification: {0}")]
    Validation(#[from] ValidationError),

    #[error("required file {} is missing", path.display())]
    MissingFile { path: PathBuf },
}

impl ExecutionError {
    /// Only sandbox failures are retried; a bad test definition or a missing file
    /// fails the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Sandbox(_))
    }
}
