//! # Utilities
//!
//! Helpers shared by the renderers.
//!
//! - [`line_diff`]: expected-versus-actual line diffs for output feedback.

pub mod line_diff;
