//! Trend lines for correlation plots
//!
//! A copy of a counting table is conditioned by merging rows that tie on the
//! x column, then a least-squares line is fitted through the ordered
//! (x, y) count pairs. Invalid fits (non-finite coefficients) must be skipped
//! by callers.

mod duplicates;
mod linear;

pub use duplicates::resolve_duplicate_rows;
pub use linear::{fit_counts, fit_linear, LinearFunction, MathFunction, RegressionResult};
