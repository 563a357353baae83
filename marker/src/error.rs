//! Marker Error Types
//!
//! The renderers are pure functions over records the caller fetched. The
//! only way they can fail is being handed records that do not belong
//! together, and [`MarkerError`] describes which pairing was wrong.

pub type MarkerResult<T> = Result<T, MarkerError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkerError {
    /// A result row was rendered against a test it was not produced by.
    #[error("{kind} result belongs to {expected_kind} {found}, not {expected}")]
    ResultMismatch {
        kind: &'static str,
        expected_kind: &'static str,
        expected: i64,
        found: i64,
    },

    /// Results from different submissions were mixed into one report.
    #[error("result for submission {found} passed into the report for submission {expected}")]
    SubmissionMismatch { expected: i64, found: i64 },
}
