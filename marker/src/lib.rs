//! # Marker Library
//!
//! Turns stored grading results into the feedback a particular viewer is
//! allowed to see, and totals the points that feedback shows.
//!
//! ## Key Concepts
//! - **Feedback configuration**: per test (or student suite) levels that
//!   decide which sections of a result are shown. See [`feedback::resolve`].
//! - **Rendering**: [`feedback::test_case`] and [`feedback::student_suite`]
//!   redact one result under one configuration.
//! - **Reports**: [`report::build_submission_report`] renders a whole
//!   submission for one viewer.
//!
//! Nothing in this crate touches the store or a clock; callers pass in the
//! records and "now".

pub mod error;
pub mod feedback;
pub mod report;
pub mod scorer;
pub mod utilities;

pub use error::{MarkerError, MarkerResult};
pub use feedback::{FeedbackContext, Rendered, Viewer};
pub use report::{SubmissionReport, build_submission_report};
