//! Scan findings and the sources that provide them
//!
//! A finding source lists analyzed artifacts (scan jobs) and yields the
//! findings of each one. The shipped source reads a JSON export:
//!
//! ```json
//! {
//!   "jobs": [
//!     {
//!       "id": 17,
//!       "sha256": "9f2c...",
//!       "finished_analyses": 12,
//!       "failed_analyses": 1,
//!       "finish_date": 1700000000,
//!       "findings": [
//!         { "category": "Code Quality", "type": "UNUSED_RESOURCE" },
//!         { "category": "Injection", "type": "SQL_INJECTION" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

/// Identity of an analyzed artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether an issue concerns code quality or security
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    Quality,
    Security,
}

impl IssueKind {
    /// Classify a category label
    pub fn of_category(category: &str, quality_category: &str) -> Self {
        if category == quality_category {
            IssueKind::Quality
        } else {
            IssueKind::Security
        }
    }

    /// Column label used for this kind in plots and stores
    pub fn label(self, quality_category: &str) -> String {
        match self {
            IssueKind::Quality => quality_category.to_string(),
            IssueKind::Security => "Security".to_string(),
        }
    }
}

/// A single issue reported for an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Category label (e.g. "Injection", "Code Quality")
    pub category: String,

    /// Issue type within the category (e.g. "SQL_INJECTION")
    #[serde(rename = "type")]
    pub issue_type: String,
}

impl Finding {
    pub fn new(category: impl Into<String>, issue_type: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            issue_type: issue_type.into(),
        }
    }

    pub fn kind(&self, quality_category: &str) -> IssueKind {
        IssueKind::of_category(&self.category, quality_category)
    }

    pub fn is_quality(&self, quality_category: &str) -> bool {
        self.kind(quality_category) == IssueKind::Quality
    }
}

/// Status of one analyzed artifact, without its findings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub id: ArtifactId,

    /// Content hash; artifacts analyzed more than once share it
    pub sha256: String,

    #[serde(default)]
    pub finished_analyses: u64,

    #[serde(default)]
    pub failed_analyses: u64,

    /// Completion time, absent while the job is still running
    #[serde(default)]
    pub finish_date: Option<u64>,
}

impl ArtifactSummary {
    /// Failed analyses of a finished job; unfinished jobs rank last
    pub fn failure_count(&self) -> u64 {
        match self.finish_date {
            Some(date) if date > 0 => self.failed_analyses,
            _ => u64::MAX,
        }
    }
}

/// Keep the artifacts worth analyzing
///
/// Jobs without any finished analysis are dropped. Among jobs sharing a
/// content hash only the one with the fewest failed analyses survives, so
/// every hash contributes at most one artifact:
/// - tied failure counts keep only the lowest id, not every tied job
/// - an unfinished job ranks last and never displaces a finished sibling
///
/// The result is sorted by id.
pub fn select_artifacts(artifacts: Vec<ArtifactSummary>) -> Vec<ArtifactSummary> {
    let mut best: HashMap<String, ArtifactSummary> = HashMap::new();
    for artifact in artifacts.into_iter().filter(|a| a.finished_analyses > 0) {
        let better = best.get(&artifact.sha256).map_or(true, |kept| {
            (artifact.failure_count(), artifact.id) < (kept.failure_count(), kept.id)
        });
        if better {
            best.insert(artifact.sha256.clone(), artifact);
        }
    }

    let mut selected: Vec<ArtifactSummary> = best.into_values().collect();
    selected.sort_by_key(|a| a.id);
    selected
}

/// Provider of analyzed artifacts and their findings
pub trait FindingSource {
    /// All artifacts known to the source
    fn artifacts(&self) -> Result<Vec<ArtifactSummary>>;

    /// Findings of one artifact; `None` when the job has no results
    fn findings(&self, id: ArtifactId) -> Result<Option<Vec<Finding>>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportedJob {
    #[serde(flatten)]
    summary: ArtifactSummary,

    #[serde(default)]
    findings: Option<Vec<Finding>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FindingExport {
    jobs: Vec<ExportedJob>,
}

/// Finding source backed by a JSON export of scan jobs
#[derive(Debug, Default)]
pub struct JsonFindingSource {
    jobs: BTreeMap<ArtifactId, ExportedJob>,
}

impl JsonFindingSource {
    /// Load an export file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let export: FindingExport = serde_json::from_str(content)?;
        Ok(Self {
            jobs: export
                .jobs
                .into_iter()
                .map(|job| (job.summary.id, job))
                .collect(),
        })
    }

    /// Add a job in memory
    pub fn insert(&mut self, summary: ArtifactSummary, findings: Option<Vec<Finding>>) {
        self.jobs
            .insert(summary.id, ExportedJob { summary, findings });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl FindingSource for JsonFindingSource {
    fn artifacts(&self) -> Result<Vec<ArtifactSummary>> {
        Ok(self.jobs.values().map(|job| job.summary.clone()).collect())
    }

    fn findings(&self, id: ArtifactId) -> Result<Option<Vec<Finding>>> {
        Ok(self.jobs.get(&id).and_then(|job| job.findings.clone()))
    }
}

/// Number of findings per category across every artifact of a source
pub fn category_sizes(source: &dyn FindingSource) -> Result<BTreeMap<String, u64>> {
    let mut sizes = BTreeMap::new();
    for artifact in source.artifacts()? {
        for finding in source.findings(artifact.id)?.unwrap_or_default() {
            *sizes.entry(finding.category).or_insert(0) += 1;
        }
    }
    Ok(sizes)
}
