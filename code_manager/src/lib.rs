//! # Grading scheduler
//!
//! Drives submissions through the grading pipeline: a periodic sweep moves
//! received submissions into the work queue, a fixed pool of workers runs
//! each unit in its own sandbox with bounded retries, and the rerun
//! coordinator fans bulk regrades out into the same queue.

pub mod error;
pub mod grader;
pub mod manager;
pub mod rerun;
pub mod retry;

pub use error::{GradingError, GradingResult};
pub use grader::{Grader, UnitOutcome};
pub use manager::manager::{GradingManager, ManagerSettings};
pub use manager::queue::{GradingUnit, SuiteRef, WorkQueue};
pub use rerun::RerunCoordinator;
pub use retry::RetryPolicy;
