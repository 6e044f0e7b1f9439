// Permutation-based significance threshold for rank correlations
//
// Builds a null distribution by repeatedly flipping a fair coin per row and,
// on heads, exchanging that row's two values. The (1 - p) quantile of the
// resulting correlations is the magnitude chance alone reaches with error
// probability p. No distribution shape is assumed, which matters for sparse,
// skewed issue counts.

use crate::correlation::spearman::{spearman, spearman_counts, to_f64};
use crate::table::CountingTable;
use rand::Rng;

/// Default number of randomized trials
pub const DEFAULT_PERMUTATIONS: usize = 100;

/// Default error probability of the threshold
pub const DEFAULT_ERROR_PROBABILITY: f64 = 0.05;

/// Permutation significance tester
///
/// # Example
/// ```
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use secqual::correlation::SignificanceTester;
///
/// let tester = SignificanceTester::default();
/// let mut rng = StdRng::seed_from_u64(7);
/// let threshold = tester.threshold(&[10.0, 20.0, 30.0], &[30.0, 10.0, 20.0], &mut rng);
/// assert_eq!(threshold, 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceTester {
    /// Number of randomized trials
    pub permutations: usize,

    /// Error probability p; the threshold is the (1 - p) quantile
    pub error_probability: f64,
}

impl Default for SignificanceTester {
    fn default() -> Self {
        Self {
            permutations: DEFAULT_PERMUTATIONS,
            error_probability: DEFAULT_ERROR_PROBABILITY,
        }
    }
}

impl SignificanceTester {
    pub fn new(permutations: usize, error_probability: f64) -> Self {
        Self {
            permutations,
            error_probability,
        }
    }

    /// Significance threshold for two equal-length vectors
    ///
    /// Returns 0 when no trial produced a usable correlation (including
    /// mismatched or too short input, where every trial is NaN).
    pub fn threshold<R: Rng + ?Sized>(&self, vals1: &[f64], vals2: &[f64], rng: &mut R) -> f64 {
        let mut trials = Vec::with_capacity(self.permutations);
        let mut left = vals1.to_vec();
        let mut right = vals2.to_vec();

        for _ in 0..self.permutations {
            left.copy_from_slice(vals1);
            right.copy_from_slice(vals2);
            if left.len() == right.len() {
                for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                    if rng.gen_bool(0.5) {
                        std::mem::swap(l, r);
                    }
                }
            }
            let correlation = spearman(&left, &right);
            if !correlation.is_nan() {
                trials.push(correlation);
            }
        }

        self.quantile(trials)
    }

    /// Significance threshold for two columns of a counting table
    ///
    /// Every trial works on its own deep copy of `table`; the caller's table
    /// is never modified. Rows are visited in ascending key order so a seeded
    /// generator reproduces the same threshold.
    pub fn table_threshold<Row, Col, G>(
        &self,
        table: &CountingTable<Row, Col>,
        column1: &Col,
        column2: &Col,
        rng: &mut G,
    ) -> f64
    where
        Row: Ord + Clone,
        Col: Ord + Clone,
        G: Rng + ?Sized,
    {
        let mut trials = Vec::with_capacity(self.permutations);

        for _ in 0..self.permutations {
            let mut trial = table.clone();
            for row in table.rows() {
                if rng.gen_bool(0.5) {
                    let first = table.get(row, column1);
                    let second = table.get(row, column2);
                    trial.remove(row, column1);
                    trial.remove(row, column2);
                    trial.set(row.clone(), column1.clone(), second);
                    trial.set(row.clone(), column2.clone(), first);
                }
            }

            let correlation = spearman_counts(
                &trial.column_values(column1),
                &trial.column_values(column2),
            );
            if !correlation.is_nan() {
                trials.push(correlation);
            }
        }

        self.quantile(trials)
    }

    /// Significance threshold for two count vectors
    pub fn count_threshold<R: Rng + ?Sized>(&self, vals1: &[u64], vals2: &[u64], rng: &mut R) -> f64 {
        self.threshold(&to_f64(vals1), &to_f64(vals2), rng)
    }

    /// The (1 - p) quantile of the surviving trial correlations
    fn quantile(&self, mut trials: Vec<f64>) -> f64 {
        if trials.is_empty() {
            return 0.0;
        }
        trials.sort_by(f64::total_cmp);

        let idx = (trials.len() as f64 * (1.0 - self.error_probability)).floor() as usize;
        trials[idx.min(trials.len() - 1)]
    }
}

/// Whether an observed correlation exceeds the chance threshold
///
/// NaN correlations are never significant.
pub fn is_significant(correlation: f64, threshold: f64) -> bool {
    correlation.abs() > threshold.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_parameters() {
        let tester = SignificanceTester::default();
        assert_eq!(tester.permutations, 100);
        assert_eq!(tester.error_probability, 0.05);
    }

    #[test]
    fn test_zero_permutations_returns_zero() {
        let tester = SignificanceTester::new(0, 0.05);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(tester.threshold(&[1.0, 2.0, 3.0], &[3.0, 1.0, 2.0], &mut rng), 0.0);
    }

    #[test]
    fn test_all_trials_nan_returns_zero() {
        // Both columns constant and equal: every trial is degenerate
        let tester = SignificanceTester::default();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(tester.threshold(&[4.0, 4.0, 4.0], &[4.0, 4.0, 4.0], &mut rng), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_return_zero() {
        let tester = SignificanceTester::default();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(tester.threshold(&[1.0, 2.0, 3.0], &[1.0, 2.0], &mut rng), 0.0);
    }

    #[test]
    fn test_seeded_threshold_is_reproducible() {
        let tester = SignificanceTester::default();
        let x: Vec<f64> = (1..=20).map(f64::from).collect();
        let y: Vec<f64> = (1..=20).map(|i| f64::from(i) * 100.0).collect();

        let first = tester.threshold(&x, &y, &mut StdRng::seed_from_u64(42));
        let second = tester.threshold(&x, &y, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_threshold_within_correlation_range() {
        let tester = SignificanceTester::default();
        let x = [1.0, 7.0, 3.0, 9.0, 2.0, 8.0];
        let y = [5.0, 1.0, 6.0, 2.0, 9.0, 4.0];
        let threshold = tester.threshold(&x, &y, &mut StdRng::seed_from_u64(9));
        assert!((-1.0..=1.0).contains(&threshold));
    }

    #[test]
    fn test_table_threshold_leaves_table_untouched() {
        let mut table = CountingTable::new();
        for (row, (a, b)) in [(10u64, 30u64), (20, 10), (30, 20)].into_iter().enumerate() {
            table.set(row as u64, "A", a);
            table.set(row as u64, "B", b);
        }
        let before = table.clone();

        let tester = SignificanceTester::default();
        tester.table_threshold(&table, &"A", &"B", &mut StdRng::seed_from_u64(5));
        assert_eq!(table, before);
    }

    #[test]
    fn test_table_and_vector_variants_agree() {
        // Same rows, same coin flips in the same order
        let mut table = CountingTable::new();
        let a = [3u64, 9, 1, 14, 6, 2, 11];
        let b = [7u64, 2, 8, 1, 12, 5, 4];
        for (row, (&x, &y)) in a.iter().zip(&b).enumerate() {
            table.set(row as u64, "A", x);
            table.set(row as u64, "B", y);
        }

        let tester = SignificanceTester::default();
        let from_table = tester.table_threshold(&table, &"A", &"B", &mut StdRng::seed_from_u64(11));
        let from_vectors = tester.count_threshold(&a, &b, &mut StdRng::seed_from_u64(11));
        assert_eq!(from_table, from_vectors);
    }

    #[test]
    fn test_quantile_index_clamped() {
        let tester = SignificanceTester::new(10, 0.0);
        assert_eq!(tester.quantile(vec![0.3, -0.2, 0.9]), 0.9);
    }

    #[test]
    fn test_quantile_picks_floor_position() {
        let tester = SignificanceTester::new(10, 0.05);
        let trials: Vec<f64> = (0..100).map(|i| f64::from(i) / 100.0).collect();
        assert_eq!(tester.quantile(trials), 0.95);
    }

    #[test]
    fn test_is_significant() {
        assert!(is_significant(0.8, 0.4));
        assert!(is_significant(-0.8, 0.4));
        assert!(!is_significant(0.4, 0.4));
        assert!(!is_significant(0.2, -0.3));
        assert!(!is_significant(f64::NAN, 0.1));
    }
}
