//! Two-key frequency table used to aggregate findings per artifact
//!
//! Rows are entities (analyzed artifacts), columns are labels (categories,
//! issue types or issue kinds). A cell that was never written reads as 0.
//! Rows and columns stay known once observed, even if their cells are
//! removed later, so vectors extracted from a table always have one entry
//! per known row.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Frequency table keyed by (row, column)
///
/// # Example
/// ```
/// use secqual::table::CountingTable;
///
/// let mut table: CountingTable<u64, String> = CountingTable::new();
/// table.increment(1, "Injection".to_string());
/// table.add(2, "Injection".to_string(), 4);
///
/// assert_eq!(table.get(&1, &"Injection".to_string()), 1);
/// assert_eq!(table.get(&3, &"Injection".to_string()), 0);
/// assert_eq!(table.column_values(&"Injection".to_string()), vec![1, 4]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountingTable<R, C> {
    cells: BTreeMap<R, BTreeMap<C, u64>>,
    columns: BTreeSet<C>,
}

impl<R: Ord + Clone, C: Ord + Clone> Default for CountingTable<R, C> {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
            columns: BTreeSet::new(),
        }
    }
}

impl<R: Ord + Clone, C: Ord + Clone> CountingTable<R, C> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to the cell at (row, column)
    pub fn increment(&mut self, row: R, column: C) {
        self.add(row, column, 1);
    }

    /// Add `delta` to the cell at (row, column)
    ///
    /// Adding 0 still registers the row and the column.
    pub fn add(&mut self, row: R, column: C, delta: u64) {
        self.columns.insert(column.clone());
        let cell = self.cells.entry(row).or_default().entry(column).or_insert(0);
        *cell = cell.saturating_add(delta);
    }

    /// Add every (label, count) pair of one row at once
    pub fn add_all<'a, I>(&mut self, row: R, counts: I)
    where
        I: IntoIterator<Item = (&'a C, &'a u64)>,
        C: 'a,
    {
        for (column, count) in counts {
            self.add(row.clone(), column.clone(), *count);
        }
    }

    /// Overwrite the cell at (row, column)
    pub fn set(&mut self, row: R, column: C, value: u64) {
        self.columns.insert(column.clone());
        self.cells.entry(row).or_default().insert(column, value);
    }

    /// Read the cell at (row, column), 0 if never written
    pub fn get(&self, row: &R, column: &C) -> u64 {
        self.cells
            .get(row)
            .and_then(|cols| cols.get(column))
            .copied()
            .unwrap_or(0)
    }

    /// Clear the cell at (row, column), returning its previous value
    ///
    /// The row and the column remain known to the table.
    pub fn remove(&mut self, row: &R, column: &C) -> Option<u64> {
        self.cells.get_mut(row).and_then(|cols| cols.remove(column))
    }

    /// All known rows in ascending key order
    pub fn rows(&self) -> impl Iterator<Item = &R> {
        self.cells.keys()
    }

    /// All known columns in ascending key order
    pub fn columns(&self) -> impl Iterator<Item = &C> {
        self.columns.iter()
    }

    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of recorded cells
    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One column as a row → count mapping covering every known row
    pub fn column_as_map(&self, column: &C) -> BTreeMap<R, u64> {
        self.cells
            .iter()
            .map(|(row, cols)| (row.clone(), cols.get(column).copied().unwrap_or(0)))
            .collect()
    }

    /// Values of one column, one per known row, with rows sorted by `compare`
    ///
    /// The result depends only on the table contents and `compare`, never on
    /// the order in which rows were inserted. `compare` must be a total order;
    /// equal rows keep ascending key order.
    pub fn ordered_column_values<F>(&self, column: &C, mut compare: F) -> Vec<u64>
    where
        F: FnMut(&R, &R) -> Ordering,
    {
        let mut rows: Vec<&R> = self.cells.keys().collect();
        rows.sort_by(|a, b| compare(a, b));
        rows.into_iter().map(|row| self.get(row, column)).collect()
    }

    /// Values of one column in ascending row key order
    pub fn column_values(&self, column: &C) -> Vec<u64> {
        self.ordered_column_values(column, |a, b| a.cmp(b))
    }
}
