//! End-to-end tests of ingestion, correlation and plotting through the library

mod utils;

use secqual::aggregate::CorpusTables;
use secqual::config::AnalysisConfig;
use secqual::correlation::PairKey;
use secqual::engine::Engine;
use secqual::findings::{ArtifactId, JsonFindingSource};
use secqual::report::{self, TexFileSink};
use secqual::store::{ArtifactStore, Axis, CorrelationStore, JsonStore, MemoryStore};

fn source() -> JsonFindingSource {
    JsonFindingSource::from_json(&utils::export().to_string()).unwrap()
}

fn config(seed: u64) -> AnalysisConfig {
    AnalysisConfig {
        workers: 3,
        seed: Some(seed),
        ..AnalysisConfig::default()
    }
}

#[test]
fn test_selection_drops_duplicates_and_unfinished() {
    let config = config(1);
    let store = MemoryStore::new();
    let summary = Engine::new(&config).run(&source(), &store).unwrap();

    assert_eq!(summary.ingest.selected, utils::ARTIFACTS as usize);
    assert!(!store.exists(ArtifactId(9)).unwrap());
    assert!(!store.exists(ArtifactId(10)).unwrap());
    assert_eq!(store.load_all().unwrap().len(), 8);
}

#[test]
fn test_known_correlations() {
    let config = config(5);
    let store = MemoryStore::new();
    Engine::new(&config).run(&source(), &store).unwrap();

    let records = store.records().unwrap();
    let find = |axis: Axis, a: &str, b: &str| {
        records
            .iter()
            .find(|r| r.axis == axis && r.pair == PairKey::new(a, b))
            .unwrap()
            .clone()
    };

    let same = find(Axis::Category, "Code Quality", "Injection");
    assert_eq!(same.correlation, 1.0);
    assert!(same.correlation > same.significance.abs());

    let opposite = find(Axis::IssueType, "SQLI", "WEAK_HASH");
    assert_eq!(opposite.correlation, -1.0);

    for record in &records {
        assert!(record.correlation.is_nan() || (-1.0..=1.0).contains(&record.correlation));
    }
}

#[test]
fn test_json_store_resumes_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(2);
    let engine = Engine::new(&config);

    let first = {
        let store = JsonStore::open(dir.path()).unwrap();
        engine.run(&source(), &store).unwrap()
    };
    assert_eq!(first.ingest.recorded, 8);

    let store = JsonStore::open(dir.path()).unwrap();
    let second = engine.run(&source(), &store).unwrap();
    assert_eq!(second.ingest.recorded, 0);
    assert_eq!(second.ingest.reloaded, 8);
    for axis in &second.axes {
        assert_eq!(axis.pairs.done, 0);
        assert!(axis.pairs.skipped > 0);
    }
}

#[test]
fn test_stored_records_reproduce_tables() {
    let config = config(4);
    let store = MemoryStore::new();
    let engine = Engine::new(&config);
    let (ingested, _) = engine.ingest(&source(), &store).unwrap();

    let reloaded = CorpusTables::from_records(&store.load_all().unwrap(), &config.quality_category);
    assert_eq!(reloaded.categories, ingested.categories);
    assert_eq!(reloaded.issue_types, ingested.issue_types);
    assert_eq!(reloaded.kinds, ingested.kinds);
}

#[test]
fn test_render_corpus_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(6);
    let store = MemoryStore::new();
    let (tables, _) = Engine::new(&config).ingest(&source(), &store).unwrap();

    let sink = TexFileSink::new(dir.path(), false).unwrap();
    let summaries = report::render_corpus(
        &tables,
        &config.quality_category,
        report::DEFAULT_TEMPLATE,
        &sink,
        config.workers,
    )
    .unwrap();

    let done: Vec<(Axis, usize)> = summaries.iter().map(|(axis, s)| (*axis, s.done)).collect();
    assert_eq!(
        done,
        vec![(Axis::Kind, 2), (Axis::Category, 12), (Axis::IssueType, 12)]
    );
    assert!(dir.path().join("Vuln_SQLI-DEAD_CODE.tex").exists());
}
