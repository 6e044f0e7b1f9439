// Rank correlation and permutation significance
//
// This module decides whether two issue-count columns move together beyond
// what chance explains:
// - Spearman's rank correlation (robust to skew and monotone non-linearity)
// - A permutation tester that derives the chance-level correlation magnitude
//   from the data itself, without assuming a null distribution shape
// - Normalized unordered pairs so every label pair is computed exactly once
//
// All routines here are pure: they read their inputs, own their generators
// and copies, and never block on I/O.

mod pairs;
mod significance;
mod spearman;

pub use pairs::{correlate_columns, pair_rng, unique_pairs, PairCorrelation, PairKey};
pub use significance::{
    is_significant, SignificanceTester, DEFAULT_ERROR_PROBABILITY, DEFAULT_PERMUTATIONS,
};
pub use spearman::{ranks, spearman, spearman_counts};
