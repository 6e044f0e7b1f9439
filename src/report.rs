//! LaTeX scatter plots with trend lines for label pairs
//!
//! For every ordered pair (x, y) of distinct labels of an axis a plot report
//! is produced: the artifact counts as data points and a least-squares line
//! fitted on a copy of the table whose rows were merged on equal x counts.
//! Reports are filled into a pgfplots template and handed to a
//! [`RenderSink`].
//!
//! Template placeholders:
//! - `CATNAME1` / `CATNAME2`: x and y labels, underscores escaped
//! - `%CAT1`: tab-separated data points, one artifact per line
//! - `$a$` / `$b$`: slope and intercept
//! - `$QUALITY$`: quality score of the fit
//! - `$xmin` / `$xmax`: range of the x counts

use crate::aggregate::CorpusTables;
use crate::error::{AnalysisError, Result};
use crate::findings::ArtifactId;
use crate::pool::{self, Outcome, PoolSummary};
use crate::store::Axis;
use crate::table::CountingTable;
use crate::trend::{fit_counts, resolve_duplicate_rows, LinearFunction, RegressionResult};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Template used when no custom template is given
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/correlation.tex");

/// Load a template file, or the built-in one
pub fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Escape a label for use in LaTeX text
pub fn escape_label(label: &str) -> String {
    label.replace('_', "\\_")
}

/// Make a label safe to embed in a file name
///
/// Path separators and other characters that are not portable in file names
/// become `_`; letters, digits, spaces and `_ - . +` are kept.
pub fn file_name_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn two_decimals(value: f64) -> String {
    format!("{value:.2}")
}

/// An ordered label pair: `x` on the horizontal axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotPair {
    pub x: String,
    pub y: String,
}

impl fmt::Display for PlotPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.x, self.y)
    }
}

/// Every ordered pair of distinct labels
pub fn ordered_pairs<'a, I>(labels: I) -> Vec<PlotPair>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut labels: Vec<&str> = labels.into_iter().collect();
    labels.sort_unstable();
    labels.dedup();

    let mut pairs = Vec::with_capacity(labels.len() * labels.len().saturating_sub(1));
    for x in &labels {
        for y in &labels {
            if x != y {
                pairs.push(PlotPair {
                    x: (*x).to_string(),
                    y: (*y).to_string(),
                });
            }
        }
    }
    pairs
}

/// A filled plot for one ordered label pair
#[derive(Debug, Clone, PartialEq)]
pub struct PlotReport {
    pub axis: Axis,
    pub pair: PlotPair,
    pub fit: RegressionResult<LinearFunction>,
    pub xmin: f64,
    pub xmax: f64,
    /// The filled template
    pub tex: String,
}

impl PlotReport {
    /// File name without extension, e.g. `Cat_Crypto-Injection`
    pub fn file_stem(&self) -> String {
        format!(
            "{}{}-{}",
            self.axis.plot_prefix(),
            file_name_label(&self.pair.x),
            file_name_label(&self.pair.y)
        )
    }
}

/// Data points of two columns, one `x<TAB>y` line per artifact
pub fn data_points(table: &CountingTable<ArtifactId, String>, pair: &PlotPair) -> String {
    let mut points = String::with_capacity(table.row_count() * 12);
    for row in table.rows() {
        points.push_str(&table.get(row, &pair.x).to_string());
        points.push('\t');
        points.push_str(&table.get(row, &pair.y).to_string());
        points.push('\n');
    }
    points
}

/// Build the plot for one ordered pair
///
/// Returns `None` when the fitted line is not finite or when every artifact
/// has the same x count (at two decimals), since neither can be drawn.
pub fn plot_pair(
    table: &CountingTable<ArtifactId, String>,
    axis: Axis,
    pair: &PlotPair,
    template: &str,
) -> Result<Option<PlotReport>> {
    let mut merged = table.clone();
    resolve_duplicate_rows(&mut merged, &pair.x);

    let by_x = |a: &ArtifactId, b: &ArtifactId| {
        merged
            .get(a, &pair.x)
            .cmp(&merged.get(b, &pair.x))
            .then_with(|| a.cmp(b))
    };
    let xs = merged.ordered_column_values(&pair.x, by_x);
    let ys = merged.ordered_column_values(&pair.y, by_x);

    let fit = fit_counts(&xs, &ys)?;
    if !fit.is_valid() {
        debug!("{} {}: no finite trend line", axis, pair);
        return Ok(None);
    }

    let x_counts = table.column_as_map(&pair.x);
    let xmin = x_counts.values().copied().min().unwrap_or(0) as f64;
    let xmax = x_counts.values().copied().max().unwrap_or(0) as f64;
    if (xmin * 100.0).round() == (xmax * 100.0).round() {
        debug!("{} {}: degenerate x range", axis, pair);
        return Ok(None);
    }

    let tex = template
        .replace("CATNAME1", &escape_label(&pair.x))
        .replace("CATNAME2", &escape_label(&pair.y))
        .replace("%CAT1", &data_points(table, pair))
        .replace("$a$", &two_decimals(fit.function().a()))
        .replace("$b$", &two_decimals(fit.function().b()))
        .replace("$QUALITY$", &two_decimals(fit.quality()))
        .replace("$xmin", &two_decimals(xmin))
        .replace("$xmax", &two_decimals(xmax));

    Ok(Some(PlotReport {
        axis,
        pair: pair.clone(),
        fit,
        xmin,
        xmax,
        tex,
    }))
}

/// Destination of filled plot reports
pub trait RenderSink: Send + Sync {
    fn render(&self, report: &PlotReport) -> Result<()>;
}

/// Writes `<prefix><x>-<y>.tex` files, optionally compiling them to PDF
#[derive(Debug, Clone)]
pub struct TexFileSink {
    dir: PathBuf,
    compile: bool,
}

impl TexFileSink {
    /// Create the sink, creating `dir` if needed
    pub fn new<P: AsRef<Path>>(dir: P, compile: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, compile })
    }

    pub fn path_for(&self, report: &PlotReport) -> PathBuf {
        self.dir.join(format!("{}.tex", report.file_stem()))
    }

    fn compile(&self, tex: &Path) -> Result<()> {
        let status = Command::new("pdflatex")
            .arg("-interaction=nonstopmode")
            .arg(tex)
            .current_dir(&self.dir)
            .stdout(Stdio::null())
            .status()
            .map_err(|e| AnalysisError::Render(format!("failed to run pdflatex: {e}")));

        // pdflatex byproducts
        for extension in ["aux", "log"] {
            let byproduct = tex.with_extension(extension);
            if byproduct.exists() {
                fs::remove_file(&byproduct)?;
            }
        }

        let status = status?;
        if !status.success() {
            return Err(AnalysisError::Render(format!(
                "pdflatex exited with {} for {}",
                status,
                tex.display()
            )));
        }
        Ok(())
    }
}

impl RenderSink for TexFileSink {
    fn render(&self, report: &PlotReport) -> Result<()> {
        let path = self.path_for(report);
        fs::write(&path, &report.tex)?;
        if self.compile {
            self.compile(&path)?;
        }
        Ok(())
    }
}

/// Render every ordered pair of one axis table on the worker pool
pub fn render_axis(
    table: &CountingTable<ArtifactId, String>,
    axis: Axis,
    template: &str,
    sink: &dyn RenderSink,
    workers: usize,
) -> Result<PoolSummary> {
    let pairs = ordered_pairs(table.columns().map(String::as_str));
    info!("Plotting {} pairs of {}", pairs.len(), axis.noun());

    let summary = pool::run(workers, pairs, |pair| {
        match plot_pair(table, axis, pair, template)? {
            Some(report) => {
                sink.render(&report)?;
                debug!("Rendered {}", report.file_stem());
                Ok(Outcome::Done)
            }
            None => Ok(Outcome::Skipped),
        }
    })?;

    info!("Finished plots of {}: {}", axis.noun(), summary);
    Ok(summary)
}

/// Render the plots of every axis
pub fn render_corpus(
    tables: &CorpusTables,
    quality_category: &str,
    template: &str,
    sink: &dyn RenderSink,
    workers: usize,
) -> Result<Vec<(Axis, PoolSummary)>> {
    let mut summaries = Vec::with_capacity(Axis::ALL.len());
    for axis in Axis::ALL {
        let table = tables.axis_table(axis, quality_category);
        summaries.push((axis, render_axis(&table, axis, template, sink, workers)?));
    }
    Ok(summaries)
}
