use crate::models::submission::{SubmissionStatus, TransitionError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`GradingStore`](crate::store::GradingStore) backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    #[error("submission {submission_id} is {status}, expected one of [{expected}]")]
    UnexpectedStatus {
        submission_id: i64,
        status: SubmissionStatus,
        expected: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// An instructor-authored specification that cannot be executed as written.
///
/// Never retried: the same definition would fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
