// Configuration for correlation runs and plot generation
//
// Values come from defaults, an optional TOML file, and command-line
// overrides, in that order.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Category label that marks a finding as a code-quality issue
pub const DEFAULT_QUALITY_CATEGORY: &str = "Code Quality";

/// Maximum number of findings of one kind before an artifact is discarded
pub const DEFAULT_CUTOFF: u64 = 30_000;

/// Configuration for a correlation analysis
///
/// # Example
/// ```
/// use secqual::config::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.permutations, 100);
/// assert_eq!(config.error_probability, 0.05);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of randomized trials per label pair
    pub permutations: usize,

    /// Error probability of the significance threshold
    ///
    /// - 0.05 (default): threshold is the 95th percentile of chance correlations
    /// - 0.01: stricter, fewer pairs reported as high
    /// - 0.10: looser, more pairs reported as high
    pub error_probability: f64,

    /// Artifacts with more quality or security findings than this are skipped
    pub cutoff: u64,

    /// Size of the worker pool for pair computations and plot rendering
    pub workers: usize,

    /// Base seed for permutation trials; entropy-seeded when absent
    pub seed: Option<u64>,

    /// Category label of code-quality findings; everything else is security
    pub quality_category: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            permutations: 100,
            error_probability: 0.05,
            cutoff: DEFAULT_CUTOFF,
            workers: default_workers(),
            seed: None,
            quality_category: DEFAULT_QUALITY_CATEGORY.to_string(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl AnalysisConfig {
    /// Stricter significance (p = 0.01) with more trials
    pub fn strict() -> Self {
        Self {
            permutations: 1000,
            error_probability: 0.01,
            ..Self::default()
        }
    }

    /// Looser significance (p = 0.10)
    pub fn permissive() -> Self {
        Self {
            error_probability: 0.10,
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file
    ///
    /// Missing keys keep their defaults.
    ///
    /// # Example TOML
    /// ```toml
    /// permutations = 500
    /// error_probability = 0.01
    /// cutoff = 10000
    /// seed = 42
    /// ```
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.error_probability) {
            return Err(AnalysisError::Config(format!(
                "error_probability must be in [0, 1), got {}",
                self.error_probability
            )));
        }

        if self.workers == 0 {
            return Err(AnalysisError::Config(
                "workers must be at least 1".to_string(),
            ));
        }

        if self.cutoff == 0 {
            return Err(AnalysisError::Config(
                "cutoff must be positive".to_string(),
            ));
        }

        if self.quality_category.trim().is_empty() {
            return Err(AnalysisError::Config(
                "quality_category must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.permutations, 100);
        assert_eq!(config.error_probability, 0.05);
        assert_eq!(config.cutoff, 30_000);
        assert_eq!(config.quality_category, "Code Quality");
        assert!(config.seed.is_none());
        assert!(config.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_valid() {
        assert_eq!(AnalysisConfig::strict().error_probability, 0.01);
        assert_eq!(AnalysisConfig::permissive().error_probability, 0.10);
        assert!(AnalysisConfig::strict().validate().is_ok());
        assert!(AnalysisConfig::permissive().validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AnalysisConfig::from_toml_str("permutations = 250\nseed = 9\n").unwrap();
        assert_eq!(config.permutations, 250);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.error_probability, 0.05);
        assert_eq!(config.cutoff, DEFAULT_CUTOFF);
    }

    #[test]
    fn test_from_toml_rejects_invalid_probability() {
        let err = AnalysisConfig::from_toml_str("error_probability = 1.5").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn test_from_toml_rejects_bad_syntax() {
        let err = AnalysisConfig::from_toml_str("permutations = [").unwrap_err();
        assert!(matches!(err, AnalysisError::Toml(_)));
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secqual.toml");
        fs::write(&path, "cutoff = 500\nquality_category = \"Quality\"\n").unwrap();

        let config = AnalysisConfig::from_toml(&path).unwrap();
        assert_eq!(config.cutoff, 500);
        assert_eq!(config.quality_category, "Quality");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AnalysisConfig::from_toml("/nonexistent/secqual.toml").unwrap_err();
        assert!(matches!(err, AnalysisError::Io(_)));
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_workers() {
        let mut config = AnalysisConfig::default();
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_cutoff() {
        let mut config = AnalysisConfig::default();
        config.cutoff = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_quality_category() {
        let mut config = AnalysisConfig::default();
        config.quality_category = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
