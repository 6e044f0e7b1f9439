//! Correlation runs: ingestion of findings and pairwise analysis per axis
//!
//! A run selects the artifacts worth analyzing, summarizes the ones not yet
//! recorded, reloads every record into [`CorpusTables`], and then correlates
//! every unordered label pair of each axis on the worker pool. Pairs already
//! present in the correlation store are skipped, so an interrupted run picks
//! up where it stopped.

use crate::aggregate::{CorpusTables, ProcessedArtifact};
use crate::config::AnalysisConfig;
use crate::correlation::{
    correlate_columns, pair_rng, spearman_counts, unique_pairs, PairCorrelation, PairKey,
    SignificanceTester,
};
use crate::error::Result;
use crate::findings::{select_artifacts, ArtifactId, FindingSource, IssueKind};
use crate::pool::{self, Outcome, PoolSummary};
use crate::store::{ArtifactStore, Axis, CorrelationRecord, CorrelationStore};
use crate::table::CountingTable;
use tracing::{debug, info};

/// Counters of the ingestion phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Artifacts left after selection
    pub selected: usize,
    /// Records reloaded from the artifact store
    pub reloaded: usize,
    /// Newly summarized and stored records
    pub recorded: usize,
    /// Artifacts above the cutoff
    pub over_cutoff: usize,
    /// Artifacts whose job has no findings list
    pub without_results: usize,
}

/// Result of one axis of a correlation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSummary {
    pub axis: Axis,
    pub pairs: PoolSummary,
}

/// Result of a full correlation run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ingest: IngestSummary,
    /// Quality vs. security over all artifacts, when defined
    pub overall: Option<PairCorrelation>,
    pub axes: Vec<AxisSummary>,
}

/// Drives ingestion and correlation for one configuration
pub struct Engine<'a> {
    config: &'a AnalysisConfig,
    tester: SignificanceTester,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self {
            config,
            tester: SignificanceTester::new(config.permutations, config.error_probability),
        }
    }

    /// Build the counting tables, recording artifacts not yet in `store`
    pub fn ingest<S>(&self, source: &dyn FindingSource, store: &S) -> Result<(CorpusTables, IngestSummary)>
    where
        S: ArtifactStore + ?Sized,
    {
        let selected = select_artifacts(source.artifacts()?);
        let mut summary = IngestSummary {
            selected: selected.len(),
            ..IngestSummary::default()
        };

        let (unprocessed, processed) = store.split(selected)?;
        summary.reloaded = processed.len();
        info!(
            "{} artifacts selected, {} already processed",
            summary.selected, summary.reloaded
        );

        let mut ids: Vec<ArtifactId> = processed.iter().map(|a| a.id).collect();
        for artifact in unprocessed {
            let Some(findings) = source.findings(artifact.id)? else {
                debug!("Artifact {} has no results", artifact.id);
                summary.without_results += 1;
                continue;
            };

            let record =
                ProcessedArtifact::from_findings(artifact.id, &findings, &self.config.quality_category);
            if record.exceeds(self.config.cutoff) {
                info!(
                    "Skipping artifact {}: {} quality / {} security findings exceed cutoff {}",
                    artifact.id, record.quality_findings, record.security_findings, self.config.cutoff
                );
                summary.over_cutoff += 1;
                continue;
            }

            store.save(record)?;
            ids.push(artifact.id);
            summary.recorded += 1;
        }

        ids.sort_unstable();
        let records = store.load_many(&ids)?;
        let tables = CorpusTables::from_records(&records, &self.config.quality_category);
        info!("Aggregated {} artifacts", tables.artifact_count());

        Ok((tables, summary))
    }

    /// Quality vs. security correlation over every artifact
    ///
    /// Uses the vector form of the significance test. `None` when fewer than
    /// two artifacts were aggregated.
    pub fn overall(&self, tables: &CorpusTables) -> Option<PairCorrelation> {
        let (quality, security) = tables.kind_vectors();
        if quality.len() < 2 {
            return None;
        }

        let pair = PairKey::new(
            IssueKind::Quality.label(&self.config.quality_category),
            IssueKind::Security.label(&self.config.quality_category),
        );
        let mut rng = pair_rng(&pair, self.config.seed);
        let result = PairCorrelation {
            correlation: spearman_counts(&quality, &security),
            significance: self.tester.count_threshold(&quality, &security, &mut rng),
            pair,
        };

        info!(
            "Overall correlation {}: {:.4} (significance {:.4}){}",
            result.pair,
            result.correlation,
            result.significance,
            high_marker(&result)
        );
        Some(result)
    }

    /// Correlate every unordered column pair of `table` on the worker pool
    pub fn correlate_axis<S>(
        &self,
        axis: Axis,
        table: &CountingTable<ArtifactId, String>,
        store: &S,
    ) -> Result<PoolSummary>
    where
        S: CorrelationStore + ?Sized,
    {
        let pairs = unique_pairs(table.columns().map(String::as_str));
        info!(
            "Correlating {} pairs of {} over {} artifacts",
            pairs.len(),
            axis.noun(),
            table.row_count()
        );

        let summary = pool::run(self.config.workers, pairs, |pair| {
            if store.has(axis, pair)? {
                debug!("{} {} already stored", axis, pair);
                return Ok(Outcome::Skipped);
            }

            let mut rng = pair_rng(pair, self.config.seed);
            let result = correlate_columns(table, pair, &self.tester, &mut rng);
            info!(
                "{} {}: {:.4} (significance {:.4}){}",
                axis,
                pair,
                result.correlation,
                result.significance,
                high_marker(&result)
            );

            store.save(CorrelationRecord::new(axis, &result))?;
            Ok(Outcome::Done)
        })?;

        info!("Finished {}: {}", axis.noun(), summary);
        Ok(summary)
    }

    /// Ingest, log the overall correlation, then correlate every axis
    pub fn run<S>(&self, source: &dyn FindingSource, store: &S) -> Result<RunSummary>
    where
        S: ArtifactStore + CorrelationStore,
    {
        let (tables, ingest) = self.ingest(source, store)?;
        let overall = self.overall(&tables);

        let mut axes = Vec::with_capacity(Axis::ALL.len());
        for axis in Axis::ALL {
            let table = tables.axis_table(axis, &self.config.quality_category);
            let pairs = self.correlate_axis(axis, &table, store)?;
            axes.push(AxisSummary { axis, pairs });
        }

        Ok(RunSummary {
            ingest,
            overall,
            axes,
        })
    }
}

fn high_marker(result: &PairCorrelation) -> &'static str {
    if result.is_high() {
        " HIGH"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{ArtifactSummary, Finding, JsonFindingSource};
    use crate::store::MemoryStore;

    fn summary(id: u64, sha: &str) -> ArtifactSummary {
        ArtifactSummary {
            id: ArtifactId(id),
            sha256: sha.to_string(),
            finished_analyses: 1,
            failed_analyses: 0,
            finish_date: Some(100),
        }
    }

    fn repeat(category: &str, issue: &str, n: usize) -> Vec<Finding> {
        vec![Finding::new(category, issue); n]
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            workers: 2,
            seed: Some(11),
            ..AnalysisConfig::default()
        }
    }

    fn source() -> JsonFindingSource {
        let mut source = JsonFindingSource::default();
        for i in 1..=6u64 {
            let n = i as usize;
            let mut findings = repeat("Code Quality", "DEAD_CODE", n);
            findings.extend(repeat("Injection", "SQLI", 2 * n));
            findings.extend(repeat("Crypto", "WEAK_HASH", 7 - n));
            source.insert(summary(i, &format!("h{i}")), Some(findings));
        }
        source
    }

    #[test]
    fn test_ingest_records_and_reloads() {
        let config = config();
        let engine = Engine::new(&config);
        let store = MemoryStore::new();

        let (tables, first) = engine.ingest(&source(), &store).unwrap();
        assert_eq!(first.selected, 6);
        assert_eq!(first.recorded, 6);
        assert_eq!(tables.artifact_count(), 6);

        let (tables, second) = engine.ingest(&source(), &store).unwrap();
        assert_eq!(second.recorded, 0);
        assert_eq!(second.reloaded, 6);
        assert_eq!(tables.artifact_count(), 6);
    }

    #[test]
    fn test_ingest_applies_cutoff() {
        let config = AnalysisConfig {
            cutoff: 10,
            ..config()
        };
        let engine = Engine::new(&config);
        let store = MemoryStore::new();

        let (tables, summary) = engine.ingest(&source(), &store).unwrap();
        // security findings are 2n + (7 - n) = n + 7, above 10 for n >= 4
        assert_eq!(summary.over_cutoff, 3);
        assert_eq!(summary.recorded, 3);
        assert_eq!(tables.artifact_count(), 3);
        assert!(!store.exists(ArtifactId(5)).unwrap());
    }

    #[test]
    fn test_ingest_skips_jobs_without_results() {
        let mut source = source();
        source.insert(summary(7, "h7"), None);
        let config = config();
        let engine = Engine::new(&config);

        let (_, summary) = engine.ingest(&source, &MemoryStore::new()).unwrap();
        assert_eq!(summary.selected, 7);
        assert_eq!(summary.without_results, 1);
        assert_eq!(summary.recorded, 6);
    }

    #[test]
    fn test_overall_correlation() {
        let config = config();
        let engine = Engine::new(&config);
        let (tables, _) = engine.ingest(&source(), &MemoryStore::new()).unwrap();

        // quality = n, security = n + 7: perfectly monotone
        let overall = engine.overall(&tables).unwrap();
        assert_eq!(overall.correlation, 1.0);
        assert_eq!(overall.pair, PairKey::new("Code Quality", "Security"));
    }

    #[test]
    fn test_overall_needs_two_artifacts() {
        let config = config();
        let engine = Engine::new(&config);
        assert!(engine.overall(&CorpusTables::new()).is_none());
    }

    #[test]
    fn test_correlate_axis_stores_every_pair_once() {
        let config = config();
        let engine = Engine::new(&config);
        let store = MemoryStore::new();
        let (tables, _) = engine.ingest(&source(), &store).unwrap();
        let table = tables.axis_table(Axis::Category, &config.quality_category);

        let first = engine.correlate_axis(Axis::Category, &table, &store).unwrap();
        assert_eq!(first.done, 3);

        let second = engine.correlate_axis(Axis::Category, &table, &store).unwrap();
        assert_eq!(second.done, 0);
        assert_eq!(second.skipped, 3);

        let records = store.records().unwrap();
        let crypto_injection = records
            .iter()
            .find(|r| r.pair == PairKey::new("Injection", "Crypto"))
            .unwrap();
        assert_eq!(crypto_injection.correlation, -1.0);
    }

    #[test]
    fn test_run_covers_all_axes() {
        let config = config();
        let engine = Engine::new(&config);
        let store = MemoryStore::new();

        let summary = engine.run(&source(), &store).unwrap();
        let axes: Vec<Axis> = summary.axes.iter().map(|a| a.axis).collect();
        assert_eq!(axes, Axis::ALL.to_vec());
        // one kind pair, three category pairs, three issue type pairs
        assert_eq!(store.records().unwrap().len(), 7);
        assert!(summary.overall.is_some());
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let config = config();
        let engine = Engine::new(&config);

        let first = MemoryStore::new();
        let second = MemoryStore::new();
        engine.run(&source(), &first).unwrap();
        engine.run(&source(), &second).unwrap();

        assert_eq!(first.records().unwrap(), second.records().unwrap());
    }
}
