//! secqual - correlation of security and code-quality findings
//!
//! This library aggregates per-artifact finding counts into counting tables,
//! computes Spearman rank correlations between every pair of labels, decides
//! their significance with a permutation test, and fits trend lines for
//! LaTeX correlation plots.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod findings;
pub mod pool;
pub mod report;
pub mod store;
pub mod table;
pub mod trend;

pub use error::{AnalysisError, Result};
