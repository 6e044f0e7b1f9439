use anyhow::{Context, Result};
use clap::Parser;
use secqual::aggregate::CorpusTables;
use secqual::cli::{Cli, Command, ConfigArgs, CorrelateArgs, PlotArgs};
use secqual::config::AnalysisConfig;
use secqual::engine::Engine;
use secqual::findings::{category_sizes, JsonFindingSource};
use secqual::report::{self, TexFileSink};
use secqual::store::{ArtifactStore, JsonStore};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` raises the default level to trace
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, then the config file, then command-line overrides
fn load_config(args: &ConfigArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(label) = &args.quality_category {
        config.quality_category = label.clone();
    }
    Ok(config)
}

fn run_correlate(args: &CorrelateArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(permutations) = args.permutations {
        config.permutations = permutations;
    }
    if let Some(p) = args.error_probability {
        config.error_probability = p;
    }
    if let Some(cutoff) = args.cutoff {
        config.cutoff = cutoff;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate().context("Invalid analysis configuration")?;

    let source = JsonFindingSource::from_file(&args.findings)
        .with_context(|| format!("Failed to read findings {}", args.findings.display()))?;
    let store = open_store(&args.store)?;

    let summary = Engine::new(&config).run(&source, &store)?;
    for axis in &summary.axes {
        println!("{:<12} {}", axis.axis.to_string(), axis.pairs);
    }
    if summary.axes.iter().any(|a| a.pairs.failed > 0) {
        anyhow::bail!("Some pairs failed; rerun to retry them");
    }
    Ok(())
}

fn run_plot(args: &PlotArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    config.validate().context("Invalid analysis configuration")?;

    let store = open_store(&args.store)?;
    let records = store.load_all()?;
    if records.is_empty() {
        anyhow::bail!("No processed artifacts in {}", args.store.display());
    }
    let tables = CorpusTables::from_records(&records, &config.quality_category);

    let template = report::load_template(args.template.as_deref())
        .context("Failed to load plot template")?;
    let sink = TexFileSink::new(&args.output, args.compile)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let summaries = report::render_corpus(
        &tables,
        &config.quality_category,
        &template,
        &sink,
        config.workers,
    )?;
    for (axis, summary) in &summaries {
        println!("{:<12} {}", axis.to_string(), summary);
    }
    if summaries.iter().any(|(_, s)| s.failed > 0) {
        anyhow::bail!("Some plots failed to render");
    }
    Ok(())
}

fn run_categories(findings: &Path) -> Result<()> {
    let source = JsonFindingSource::from_file(findings)
        .with_context(|| format!("Failed to read findings {}", findings.display()))?;
    for (category, count) in category_sizes(&source)? {
        println!("{}\t{}", category, count);
    }
    Ok(())
}

fn open_store(dir: &Path) -> Result<JsonStore> {
    JsonStore::open(dir).with_context(|| format!("Failed to open store {}", dir.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match &cli.command {
        Command::Correlate(args) => run_correlate(args),
        Command::Plot(args) => run_plot(args),
        Command::Categories { findings } => run_categories(findings),
    }
}
