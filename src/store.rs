//! Persistence of processed artifacts and computed correlations
//!
//! Stores make runs resumable: artifacts already recorded are reloaded
//! instead of re-ingested, and label pairs already correlated are skipped.
//! Both store traits take `&self` so one store can serve every worker of a
//! run; implementations serialize access internally.

use crate::aggregate::ProcessedArtifact;
use crate::correlation::{PairCorrelation, PairKey};
use crate::error::{AnalysisError, Result};
use crate::findings::{ArtifactId, ArtifactSummary};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ARTIFACTS_FILE: &str = "artifacts.jsonl";
const CORRELATIONS_FILE: &str = "correlations.jsonl";

/// Which table a correlation was computed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Quality vs. security totals
    Kind,
    /// Category labels
    Category,
    /// Issue types
    IssueType,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Kind, Axis::Category, Axis::IssueType];

    /// File name prefix of plots generated for this axis
    pub fn plot_prefix(self) -> &'static str {
        match self {
            Axis::Kind => "Total_",
            Axis::Category => "Cat_",
            Axis::IssueType => "Vuln_",
        }
    }

    /// Noun used in log messages
    pub fn noun(self) -> &'static str {
        match self {
            Axis::Kind => "issue kinds",
            Axis::Category => "categories",
            Axis::IssueType => "issue types",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::Kind => "kind",
            Axis::Category => "category",
            Axis::IssueType => "issue_type",
        };
        f.write_str(name)
    }
}

/// A computed correlation between two labels of one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub axis: Axis,
    pub pair: PairKey,

    /// Spearman coefficient; NaN (stored as null) for degenerate columns
    #[serde(deserialize_with = "nan_from_null")]
    pub correlation: f64,

    /// Permutation threshold the coefficient is compared against
    #[serde(deserialize_with = "nan_from_null")]
    pub significance: f64,
}

impl CorrelationRecord {
    pub fn new(axis: Axis, result: &PairCorrelation) -> Self {
        Self {
            axis,
            pair: result.pair.clone(),
            correlation: result.correlation,
            significance: result.significance,
        }
    }
}

// serde_json writes non-finite floats as null
fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Persistence of correlation records
pub trait CorrelationStore: Send + Sync {
    /// Whether the pair was already correlated on `axis` (in either order)
    fn has(&self, axis: Axis, pair: &PairKey) -> Result<bool>;

    fn save(&self, record: CorrelationRecord) -> Result<()>;

    /// Every stored record, ordered by axis and pair
    fn records(&self) -> Result<Vec<CorrelationRecord>>;
}

/// Persistence of processed artifact records
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, id: ArtifactId) -> Result<bool>;

    fn save(&self, record: ProcessedArtifact) -> Result<()>;

    fn load_by_id(&self, id: ArtifactId) -> Result<Option<ProcessedArtifact>>;

    /// Records for `ids`; unknown ids are skipped
    fn load_many(&self, ids: &[ArtifactId]) -> Result<Vec<ProcessedArtifact>> {
        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.load_by_id(id)? {
                Some(record) => records.push(record),
                None => tracing::warn!("No processed record for artifact {}", id),
            }
        }
        Ok(records)
    }

    fn load_all(&self) -> Result<Vec<ProcessedArtifact>>;

    /// Split a worklist into (unprocessed, processed) artifacts
    fn split(
        &self,
        artifacts: Vec<ArtifactSummary>,
    ) -> Result<(Vec<ArtifactSummary>, Vec<ArtifactSummary>)> {
        let mut unprocessed = Vec::new();
        let mut processed = Vec::new();
        for artifact in artifacts {
            if self.exists(artifact.id)? {
                processed.push(artifact);
            } else {
                unprocessed.push(artifact);
            }
        }
        Ok((unprocessed, processed))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    artifacts: BTreeMap<ArtifactId, ProcessedArtifact>,
    correlations: BTreeMap<(Axis, PairKey), CorrelationRecord>,
}

fn lock<T>(state: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    state
        .lock()
        .map_err(|_| AnalysisError::Store("store lock poisoned".to_string()))
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorrelationStore for MemoryStore {
    fn has(&self, axis: Axis, pair: &PairKey) -> Result<bool> {
        Ok(lock(&self.state)?
            .correlations
            .contains_key(&(axis, pair.clone())))
    }

    fn save(&self, record: CorrelationRecord) -> Result<()> {
        lock(&self.state)?
            .correlations
            .insert((record.axis, record.pair.clone()), record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<CorrelationRecord>> {
        Ok(lock(&self.state)?.correlations.values().cloned().collect())
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, id: ArtifactId) -> Result<bool> {
        Ok(lock(&self.state)?.artifacts.contains_key(&id))
    }

    fn save(&self, record: ProcessedArtifact) -> Result<()> {
        lock(&self.state)?.artifacts.insert(record.id, record);
        Ok(())
    }

    fn load_by_id(&self, id: ArtifactId) -> Result<Option<ProcessedArtifact>> {
        Ok(lock(&self.state)?.artifacts.get(&id).cloned())
    }

    fn load_all(&self) -> Result<Vec<ProcessedArtifact>> {
        Ok(lock(&self.state)?.artifacts.values().cloned().collect())
    }
}

/// Store persisted as JSON-lines logs in a directory
///
/// Every save appends one line to `artifacts.jsonl` or `correlations.jsonl`
/// and flushes it, so the cost of a save does not grow with the store.
/// Opening replays both logs; a later line for the same key replaces an
/// earlier one. A final line cut short by an interrupted run is dropped and
/// the log compacted. `compact` rewrites each log to one line per record
/// through a temporary file and a rename.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    inner: Mutex<JsonInner>,
}

#[derive(Debug)]
struct JsonInner {
    state: StoreState,
    artifacts_log: File,
    correlations_log: File,
}

impl JsonStore {
    /// Open (or create) a store directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let (artifacts, artifacts_torn) = replay::<ProcessedArtifact>(&dir.join(ARTIFACTS_FILE))?;
        let (correlations, correlations_torn) =
            replay::<CorrelationRecord>(&dir.join(CORRELATIONS_FILE))?;

        let state = StoreState {
            artifacts: artifacts.into_iter().map(|a| (a.id, a)).collect(),
            correlations: correlations
                .into_iter()
                .map(|c| ((c.axis, c.pair.clone()), c))
                .collect(),
        };

        tracing::debug!(
            "Opened store {} ({} artifacts, {} correlations)",
            dir.display(),
            state.artifacts.len(),
            state.correlations.len()
        );

        let store = Self {
            inner: Mutex::new(JsonInner {
                state,
                artifacts_log: open_log(&dir.join(ARTIFACTS_FILE))?,
                correlations_log: open_log(&dir.join(CORRELATIONS_FILE))?,
            }),
            dir,
        };
        if artifacts_torn || correlations_torn {
            store.compact()?;
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rewrite both logs to one line per current record
    pub fn compact(&self) -> Result<()> {
        let mut inner = lock(&self.inner)?;
        let artifacts_path = self.dir.join(ARTIFACTS_FILE);
        let correlations_path = self.dir.join(CORRELATIONS_FILE);

        write_snapshot(&artifacts_path, inner.state.artifacts.values())?;
        write_snapshot(&correlations_path, inner.state.correlations.values())?;
        inner.artifacts_log = open_log(&artifacts_path)?;
        inner.correlations_log = open_log(&correlations_path)?;

        tracing::debug!(
            "Compacted store {} ({} artifacts, {} correlations)",
            self.dir.display(),
            inner.state.artifacts.len(),
            inner.state.correlations.len()
        );
        Ok(())
    }
}

/// Records of a log in file order, and whether a torn last line was dropped
fn replay<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, bool)> {
    if !path.exists() {
        return Ok((Vec::new(), false));
    }
    let content = fs::read_to_string(path)?;
    let terminated = content.ends_with('\n');
    let lines: Vec<&str> = content.lines().collect();

    let mut records = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) if !terminated && index + 1 == lines.len() => {
                tracing::warn!(
                    "Dropping incomplete last line of {}: {}",
                    path.display(),
                    e
                );
                return Ok((records, true));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok((records, false))
}

fn open_log(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn append_line<T: Serialize>(log: &mut File, record: &T) -> Result<()> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    log.write_all(&line)?;
    log.flush()?;
    Ok(())
}

fn write_snapshot<'a, T, I>(path: &Path, items: I) -> Result<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let tmp = path.with_extension("jsonl.tmp");
    let mut file = File::create(&tmp)?;
    for item in items {
        append_line(&mut file, item)?;
    }
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl CorrelationStore for JsonStore {
    fn has(&self, axis: Axis, pair: &PairKey) -> Result<bool> {
        Ok(lock(&self.inner)?
            .state
            .correlations
            .contains_key(&(axis, pair.clone())))
    }

    fn save(&self, record: CorrelationRecord) -> Result<()> {
        let mut inner = lock(&self.inner)?;
        append_line(&mut inner.correlations_log, &record)?;
        inner
            .state
            .correlations
            .insert((record.axis, record.pair.clone()), record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<CorrelationRecord>> {
        Ok(lock(&self.inner)?
            .state
            .correlations
            .values()
            .cloned()
            .collect())
    }
}

impl ArtifactStore for JsonStore {
    fn exists(&self, id: ArtifactId) -> Result<bool> {
        Ok(lock(&self.inner)?.state.artifacts.contains_key(&id))
    }

    fn save(&self, record: ProcessedArtifact) -> Result<()> {
        let mut inner = lock(&self.inner)?;
        append_line(&mut inner.artifacts_log, &record)?;
        inner.state.artifacts.insert(record.id, record);
        Ok(())
    }

    fn load_by_id(&self, id: ArtifactId) -> Result<Option<ProcessedArtifact>> {
        Ok(lock(&self.inner)?.state.artifacts.get(&id).cloned())
    }

    fn load_all(&self) -> Result<Vec<ProcessedArtifact>> {
        Ok(lock(&self.inner)?.state.artifacts.values().cloned().collect())
    }
}
