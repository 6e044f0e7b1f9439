//! Aggregation of findings into per-axis counting tables
//!
//! Every processed artifact contributes one row to three tables:
//! - categories: findings per category label
//! - issue types: findings per issue type
//! - kinds: quality vs. security findings

use crate::findings::{ArtifactId, Finding, IssueKind};
use crate::store::Axis;
use crate::table::CountingTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-artifact finding counts, persisted so later runs can reload them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedArtifact {
    pub id: ArtifactId,
    pub security_findings: u64,
    pub quality_findings: u64,
    pub categories: BTreeMap<String, u64>,
    pub issue_types: BTreeMap<String, u64>,
}

impl ProcessedArtifact {
    /// Summarize the findings of one artifact
    pub fn from_findings(id: ArtifactId, findings: &[Finding], quality_category: &str) -> Self {
        let mut record = Self {
            id,
            security_findings: 0,
            quality_findings: 0,
            categories: BTreeMap::new(),
            issue_types: BTreeMap::new(),
        };

        for finding in findings {
            match finding.kind(quality_category) {
                IssueKind::Quality => record.quality_findings += 1,
                IssueKind::Security => record.security_findings += 1,
            }
            *record
                .categories
                .entry(finding.category.clone())
                .or_insert(0) += 1;
            *record
                .issue_types
                .entry(finding.issue_type.clone())
                .or_insert(0) += 1;
        }
        record
    }

    /// More quality or security findings than `cutoff`
    pub fn exceeds(&self, cutoff: u64) -> bool {
        self.quality_findings > cutoff || self.security_findings > cutoff
    }
}

/// The three counting tables analyzed for correlations
#[derive(Debug, Clone, Default)]
pub struct CorpusTables {
    pub categories: CountingTable<ArtifactId, String>,
    pub issue_types: CountingTable<ArtifactId, String>,
    pub kinds: CountingTable<ArtifactId, IssueKind>,
}

impl CorpusTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one artifact's counts to every table
    ///
    /// Kinds are derived from the category counts, so reloaded records and
    /// freshly summarized ones aggregate identically.
    pub fn ingest(&mut self, record: &ProcessedArtifact, quality_category: &str) {
        self.categories.add_all(record.id, &record.categories);
        self.issue_types.add_all(record.id, &record.issue_types);
        for (category, &count) in &record.categories {
            self.kinds.add(
                record.id,
                IssueKind::of_category(category, quality_category),
                count,
            );
        }
    }

    /// Aggregate a set of stored records
    pub fn from_records<'a, I>(records: I, quality_category: &str) -> Self
    where
        I: IntoIterator<Item = &'a ProcessedArtifact>,
    {
        let mut tables = Self::new();
        for record in records {
            tables.ingest(record, quality_category);
        }
        tables
    }

    /// Number of artifacts aggregated
    pub fn artifact_count(&self) -> usize {
        self.categories.row_count()
    }

    /// Quality and security counts per artifact, in artifact id order
    pub fn kind_vectors(&self) -> (Vec<u64>, Vec<u64>) {
        (
            self.kinds.column_values(&IssueKind::Quality),
            self.kinds.column_values(&IssueKind::Security),
        )
    }

    /// The kinds table with string column labels, for plotting
    pub fn kind_labels(&self, quality_category: &str) -> CountingTable<ArtifactId, String> {
        let mut table = CountingTable::new();
        for row in self.kinds.rows() {
            for kind in self.kinds.columns() {
                table.add(*row, kind.label(quality_category), self.kinds.get(row, kind));
            }
        }
        table
    }

    /// The table analyzed for `axis`, with string column labels
    pub fn axis_table(&self, axis: Axis, quality_category: &str) -> CountingTable<ArtifactId, String> {
        match axis {
            Axis::Kind => self.kind_labels(quality_category),
            Axis::Category => self.categories.clone(),
            Axis::IssueType => self.issue_types.clone(),
        }
    }
}
