use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::model::{CategoryKey, Column, OffsetDataset};

// ---------------------------------------------------------------------------
// Filter predicate: which keys are included per column
// ---------------------------------------------------------------------------

/// Per-column inclusion sets: maps column → set of included keys.
/// If a column is absent or its set is empty, it means "no filter" (keep all).
pub type FilterState = BTreeMap<Column, BTreeSet<CategoryKey>>;

/// Return indices of rows with a usable sample that pass all active filters.
///
/// A row is dropped when:
/// * either offset is missing, unparseable, or the `999.0` placeholder
/// * a non-empty inclusion set exists for a column and the row's key for
///   that column is missing or not in the set
///
/// Filters on columns the dataset does not carry are ignored.
pub fn filtered_indices(dataset: &OffsetDataset, filters: &FilterState) -> Vec<usize> {
    let active: Vec<(&Column, &BTreeSet<CategoryKey>)> = filters
        .iter()
        .filter(|(col, selected)| !selected.is_empty() && dataset.has_column(**col))
        .collect();

    let measured = dataset.rows.iter().filter(|r| r.sample().is_some()).count();
    debug!(
        "dropped {} rows without a measurement, {} remain",
        dataset.len() - measured,
        measured
    );

    let indices: Vec<usize> = dataset
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.sample().is_some())
        .filter(|(_, row)| {
            active.iter().all(|(col, selected)| match row.key(**col) {
                Some(key) => selected.contains(key),
                None => false,
            })
        })
        .map(|(i, _)| i)
        .collect();

    debug!("{} rows pass {} active filters", indices.len(), active.len());
    indices
}

/// Restrict a dataset to the rows passing [`filtered_indices`].
pub fn apply(dataset: &OffsetDataset, filters: &FilterState) -> OffsetDataset {
    let rows = filtered_indices(dataset, filters)
        .into_iter()
        .map(|i| dataset.rows[i].clone())
        .collect();
    OffsetDataset::from_rows(rows)
}

/// `Spot = [1, 2]; Run = [12]` style description of the active filters.
pub fn summary(filters: &FilterState, columns: &[Column]) -> Option<String> {
    let parts: Vec<String> = columns
        .iter()
        .filter_map(|col| {
            let selected = filters.get(col).filter(|s| !s.is_empty())?;
            let keys: Vec<String> = selected.iter().map(|k| k.to_string()).collect();
            Some(format!("{} = [{}]", col.label(), keys.join(", ")))
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}
