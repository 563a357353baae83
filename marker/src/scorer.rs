//! # Scorer Module
//!
//! Point arithmetic shared by the renderers and the submission report.

use serde::Serialize;

/// Points awarded for one test case.
///
/// Compilation points are always kept; the valgrind deduction can wipe out
/// the return-code and output points but never push them below zero.
///
/// ```
/// use marker::scorer::test_case_points;
///
/// assert_eq!(test_case_points(1, 2, 3, 1), 5);
/// assert_eq!(test_case_points(1, 2, 0, 10), 1);
/// ```
pub fn test_case_points(
    compilation: u32,
    return_code: u32,
    output: u32,
    valgrind_deduction: u32,
) -> u32 {
    compilation + (return_code + output).saturating_sub(valgrind_deduction)
}

/// Running awarded/possible totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub awarded: u32,
    pub possible: u32,
}

impl Score {
    pub fn new(awarded: u32, possible: u32) -> Self {
        Self { awarded, possible }
    }

    pub fn add(&mut self, other: Score) {
        self.awarded += other.awarded;
        self.possible += other.possible;
    }

    /// Awarded over possible as a percentage rounded to two decimals, or 0
    /// when nothing is possible.
    pub fn percentage(&self) -> f64 {
        if self.possible == 0 {
            return 0.0;
        }
        round2(self.awarded as f64 / self.possible as f64 * 100.0)
    }
}

#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
