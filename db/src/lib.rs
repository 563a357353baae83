//! Domain records of the grading pipeline and the boundary to the store
//! that persists them.

pub mod error;
pub mod memory;
pub mod models;
pub mod store;
pub mod test_utils;

pub use error::{StoreError, StoreResult, ValidationError};
pub use memory::{MemoryStore, StoreSnapshot};
pub use store::{ClaimOutcome, GradingStore};
