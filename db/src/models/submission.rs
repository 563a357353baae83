use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lifecycle of a submission.
///
/// ```text
/// received -> queued -> being_graded -> finished_grading
///                                    -> waiting_for_deferred -> finished_grading
/// ```
/// `error` and `removed_from_queue` branch off the in-progress states;
/// `invalid` is only ever assigned at intake.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Deserialize,
    Serialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionStatus {
    /// Accepted by intake, not yet handed to the queue
    #[default]
    Received,
    /// Waiting for a worker
    Queued,
    /// Non-deferred suites are running
    BeingGraded,
    /// Primary grade done, deferred suites pending
    WaitingForDeferred,
    FinishedGrading,
    /// Cancelled by an explicit request
    RemovedFromQueue,
    /// Unrecoverable grading failure
    Error,
    /// Rejected by intake validation
    Invalid,
}

/// An attempted status change the state machine forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: SubmissionStatus,
    pub to: SubmissionStatus,
}

impl SubmissionStatus {
    /// Statuses that still count against "one submission in progress".
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Received | SubmissionStatus::Queued | SubmissionStatus::BeingGraded
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionStatus::FinishedGrading
                | SubmissionStatus::RemovedFromQueue
                | SubmissionStatus::Error
                | SubmissionStatus::Invalid
        )
    }

    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Received, Queued)
                | (Received, RemovedFromQueue)
                | (Queued, BeingGraded)
                | (Queued, RemovedFromQueue)
                | (Queued, Error)
                | (BeingGraded, WaitingForDeferred)
                | (BeingGraded, FinishedGrading)
                | (BeingGraded, RemovedFromQueue)
                | (BeingGraded, Error)
                | (WaitingForDeferred, FinishedGrading)
                | (WaitingForDeferred, Error)
        )
    }

    /// Returns `next` if the move is legal.
    pub fn transition(self, next: SubmissionStatus) -> Result<SubmissionStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

/// A set of files one group handed in at one point in time.
///
/// The file lists are fixed at intake; only `status` and
/// `invalid_reason_or_error` change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Submission {
    pub id: i64,
    pub group_id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub submitted_filenames: Vec<String>,
    #[serde(default)]
    pub discarded_filenames: Vec<String>,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default)]
    pub invalid_reason_or_error: Vec<String>,
}

impl Submission {
    /// A freshly received submission.
    pub fn new(id: i64, group_id: i64, submitted_filenames: Vec<String>) -> Self {
        Self {
            id,
            group_id,
            timestamp: Utc::now(),
            submitted_filenames,
            discarded_filenames: Vec::new(),
            status: SubmissionStatus::Received,
            invalid_reason_or_error: Vec::new(),
        }
    }

    /// Applies a status change, refusing illegal ones.
    pub fn advance(&mut self, next: SubmissionStatus) -> Result<(), TransitionError> {
        self.status = self.status.transition(next)?;
        Ok(())
    }
}
