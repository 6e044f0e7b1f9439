//! CLI argument parsing for secqual

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "secqual")]
#[command(version)]
#[command(about = "Correlate security and code-quality findings across analyzed artifacts", long_about = None)]
pub struct Cli {
    /// Enable verbose trace logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest findings and compute pairwise correlations
    Correlate(CorrelateArgs),

    /// Generate LaTeX correlation plots from stored artifact records
    Plot(PlotArgs),

    /// Print the number of findings per category
    Categories {
        /// JSON export of scan jobs and their findings
        #[arg(value_name = "FINDINGS")]
        findings: PathBuf,
    },
}

/// Settings shared by subcommands that read an analysis configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Category label of code-quality findings
    #[arg(long, value_name = "LABEL")]
    pub quality_category: Option<String>,
}

#[derive(Args, Debug)]
pub struct CorrelateArgs {
    /// JSON export of scan jobs and their findings
    #[arg(value_name = "FINDINGS")]
    pub findings: PathBuf,

    /// Directory holding processed artifacts and correlations
    #[arg(short, long, value_name = "DIR")]
    pub store: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Number of permutation trials per pair
    #[arg(short = 'n', long, value_name = "N")]
    pub permutations: Option<usize>,

    /// Error probability of the significance threshold (e.g. 0.05)
    #[arg(short = 'p', long, value_name = "P")]
    pub error_probability: Option<f64>,

    /// Skip artifacts with more quality or security findings than this
    #[arg(long, value_name = "COUNT")]
    pub cutoff: Option<u64>,

    /// Base seed for reproducible permutation trials
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct PlotArgs {
    /// Directory holding processed artifacts
    #[arg(short, long, value_name = "DIR")]
    pub store: PathBuf,

    /// Directory receiving the .tex files
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Custom LaTeX template (defaults to the built-in pgfplots template)
    #[arg(short, long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Compile every plot with pdflatex
    #[arg(long)]
    pub compile: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}
