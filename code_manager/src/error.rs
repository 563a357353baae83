//! Grading errors.
//!
//! The scheduler is the only place that decides between retrying and
//! giving up, so every failure a grading unit can hit funnels into
//! [`GradingError`].

use code_runner::ExecutionError;
use db::{StoreError, ValidationError};

pub type GradingResult<T> = Result<T, GradingError>;

#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ExecutionError,
    },
}

impl GradingError {
    /// The text stored in a submission's `invalid_reason_or_error`.
    ///
    /// Names the category of failure and, for sandbox trouble, how often it
    /// was tried. Sandbox messages themselves carry host paths and container
    /// names and are left to the logs.
    pub fn user_message(&self) -> String {
        match self {
            GradingError::Store(StoreError::NotFound { entity, id }) => {
                format!("Grading failed: {entity} {id} no longer exists.")
            }
            GradingError::Store(_) => "Grading failed: the grading store was unavailable.".into(),
            GradingError::Validation(err) => format!("Grading failed: invalid test setup ({err})."),
            GradingError::Execution(ExecutionError::Validation(err)) => {
                format!("Grading failed: invalid test setup ({err}).")
            }
            GradingError::Execution(ExecutionError::MissingFile { path }) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("Grading failed: required file {name:?} is missing.")
            }
            GradingError::Execution(ExecutionError::Sandbox(_)) => {
                "Grading failed: the sandbox could not run the tests.".into()
            }
            GradingError::RetriesExhausted { attempts, .. } => format!(
                "Grading failed: the sandbox could not run the tests after {attempts} attempts."
            ),
        }
    }
}
