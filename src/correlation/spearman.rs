// Spearman rank correlation
//
// Issue counts are sparse and heavily skewed (most artifacts have a handful of
// findings, a few have thousands), so relationships are compared on ranks
// rather than raw magnitudes. Ties receive the average of the ranks they span.

/// Replace each value by its 1-based rank, averaging ranks over ties
///
/// # Example
/// ```
/// use secqual::correlation::ranks;
///
/// assert_eq!(ranks(&[10.0, 30.0, 20.0]), vec![1.0, 3.0, 2.0]);
/// assert_eq!(ranks(&[5.0, 5.0, 7.0]), vec![1.5, 1.5, 3.0]);
/// ```
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let value = values[order[start]];
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == value {
            end += 1;
        }
        // Positions start..end hold 1-based ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Pearson product-moment correlation, NaN on degenerate input
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

/// Spearman's rank correlation coefficient between two vectors
///
/// Returns a value in [-1, 1], or NaN when the vectors differ in length, hold
/// fewer than two values, or either vector is constant.
///
/// # Example
/// ```
/// use secqual::correlation::spearman;
///
/// let a = [10.0, 20.0, 30.0];
/// let b = [12.0, 22.0, 33.0];
/// assert_eq!(spearman(&a, &b), 1.0);
///
/// assert!(spearman(&a, &[1.0, 1.0, 1.0]).is_nan());
/// ```
pub fn spearman(vals1: &[f64], vals2: &[f64]) -> f64 {
    if vals1.len() != vals2.len() || vals1.len() < 2 {
        return f64::NAN;
    }
    pearson(&ranks(vals1), &ranks(vals2))
}

/// Spearman correlation of two count vectors
pub fn spearman_counts(vals1: &[u64], vals2: &[u64]) -> f64 {
    spearman(&to_f64(vals1), &to_f64(vals2))
}

pub(crate) fn to_f64(values: &[u64]) -> Vec<f64> {
    values.iter().map(|&v| v as f64).collect()
}
