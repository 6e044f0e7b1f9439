// Merge rows that share a value in the x column before fitting a trend line
//
// A plot orders artifacts by their count in the x column. When several
// artifacts share that count, their order is arbitrary; averaging them into
// identical rows removes the dependence on that order.

use crate::table::CountingTable;
use std::collections::BTreeMap;

/// Average every group of rows sharing a value in `reference`
///
/// For each group with more than one row, every column of every row in the
/// group is overwritten with the group's integer-truncated average. Rows are
/// never removed. The table is modified in place; pass a clone to keep the
/// original.
///
/// # Example
/// ```
/// use secqual::table::CountingTable;
/// use secqual::trend::resolve_duplicate_rows;
///
/// let mut table = CountingTable::new();
/// for (row, x, y) in [(1u64, 5, 10), (2, 5, 20), (3, 7, 99)] {
///     table.set(row, "x", x);
///     table.set(row, "y", y);
/// }
///
/// resolve_duplicate_rows(&mut table, &"x");
/// assert_eq!(table.get(&1, &"y"), 15);
/// assert_eq!(table.get(&2, &"y"), 15);
/// assert_eq!(table.get(&3, &"y"), 99);
/// ```
pub fn resolve_duplicate_rows<R, C>(table: &mut CountingTable<R, C>, reference: &C)
where
    R: Ord + Clone,
    C: Ord + Clone,
{
    let mut groups: BTreeMap<u64, Vec<R>> = BTreeMap::new();
    for row in table.rows() {
        groups
            .entry(table.get(row, reference))
            .or_default()
            .push(row.clone());
    }

    let columns: Vec<C> = table.columns().cloned().collect();
    for rows in groups.values().filter(|rows| rows.len() > 1) {
        for column in &columns {
            // Saturated cells can sum past u64::MAX
            let total: u128 = rows.iter().map(|row| u128::from(table.get(row, column))).sum();
            let average = (total / rows.len() as u128) as u64;
            for row in rows {
                table.set(row.clone(), column.clone(), average);
            }
        }
    }
}
