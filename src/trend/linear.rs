// Least-squares linear trend lines for correlation plots

use crate::error::{AnalysisError, Result};
use std::fmt;

/// A real function of one variable that may be unusable for plotting
pub trait MathFunction {
    /// Evaluate the function at `x`
    fn compute(&self, x: f64) -> f64;

    /// Whether the function has only finite coefficients
    fn is_valid(&self) -> bool;
}

/// The line y = a*x + b
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFunction {
    a: f64,
    b: f64,
}

impl LinearFunction {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    /// Slope
    pub fn a(&self) -> f64 {
        self.a
    }

    /// Intercept
    pub fn b(&self) -> f64 {
        self.b
    }
}

impl MathFunction for LinearFunction {
    fn compute(&self, x: f64) -> f64 {
        self.a * x + self.b
    }

    fn is_valid(&self) -> bool {
        self.a.is_finite() && self.b.is_finite()
    }
}

impl fmt::Display for LinearFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "y ={:.2}*x + {:.2}", self.a, self.b)
    }
}

/// A fitted function together with its quality score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionResult<F: MathFunction> {
    function: F,
    quality: f64,
}

impl<F: MathFunction> RegressionResult<F> {
    pub fn new(function: F, quality: f64) -> Self {
        Self { function, quality }
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    /// Display-only quality score of the fit
    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn is_valid(&self) -> bool {
        self.function.is_valid()
    }
}

impl<F: MathFunction + fmt::Display> fmt::Display for RegressionResult<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.function, f)
    }
}

/// Fit y = a*x + b by ordinary least squares
///
/// The quality score is `mean(x*y) / (mean(x) * mean(y))`. This is not the
/// coefficient of determination; it is kept as the established plot label.
///
/// A zero-variance `x` yields a non-finite slope, reported through
/// [`MathFunction::is_valid`] rather than as an error.
///
/// # Errors
/// `InvalidArgument` when `x` and `y` differ in length or are empty.
///
/// # Example
/// ```
/// use secqual::trend::{fit_linear, MathFunction};
///
/// let result = fit_linear(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0]).unwrap();
/// assert!(result.is_valid());
/// assert!((result.function().a() - 2.0).abs() < 1e-12);
/// assert!(result.function().b().abs() < 1e-12);
/// assert_eq!(result.function().compute(5.0), 10.0);
/// ```
pub fn fit_linear(x: &[f64], y: &[f64]) -> Result<RegressionResult<LinearFunction>> {
    if x.len() != y.len() {
        return Err(AnalysisError::InvalidArgument(format!(
            "vectors must have equal length: {} != {}",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(AnalysisError::InvalidArgument(
            "cannot fit a line through no points".to_string(),
        ));
    }

    let n = x.len() as f64;
    let xm = x.iter().sum::<f64>() / n;
    let ym = y.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut products = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        sxy += (xi - xm) * (yi - ym);
        sxx += (xi - xm) * (xi - xm);
        products += xi * yi;
    }

    let a = sxy / sxx;
    let b = ym - a * xm;
    let quality = (products / n) / (xm * ym);

    Ok(RegressionResult::new(LinearFunction::new(a, b), quality))
}

/// Fit a line through two count vectors
pub fn fit_counts(x: &[u64], y: &[u64]) -> Result<RegressionResult<LinearFunction>> {
    let x: Vec<f64> = x.iter().map(|&v| v as f64).collect();
    let y: Vec<f64> = y.iter().map(|&v| v as f64).collect();
    fit_linear(&x, &y)
}
