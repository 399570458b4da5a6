use std::collections::{BTreeMap, BTreeSet};

use palette::Srgb;

use crate::color::ColorMap;
use crate::config::Parameters;
use crate::data::filter::{self, FilterState};
use crate::data::model::{CategoryKey, Column, OffsetDataset, OffsetRow};
use crate::data::DataError;
use crate::report::case::ReportCase;
use crate::report::chart::{ChartSpec, Series};
use crate::stats::{self, SpreadMethod};

// ---------------------------------------------------------------------------
// Report state
// ---------------------------------------------------------------------------

/// Everything one report generation works from, independent of layout.
/// Filters are applied and the colour map is fixed before any chart exists.
pub struct ReportState {
    pub case: ReportCase,

    /// Rows passing the sentinel drop and the inclusion sets.
    pub dataset: OffsetDataset,

    /// Inclusion sets that were applied.
    pub filters: FilterState,

    /// Colour map over every `color_by` key of the filtered dataset.
    pub color_map: ColorMap,

    /// Runs in numeric-first order.
    pub runs: Vec<CategoryKey>,

    /// Subgroup keys in numeric-first order.
    pub subgroups: Vec<CategoryKey>,

    pub method: SpreadMethod,
    pub percentile: f64,
    pub tolerance_radius: f64,
    pub axis_limit: f64,

    /// (run, subgroup) → row indices into `dataset`.
    groups: BTreeMap<(CategoryKey, CategoryKey), Vec<usize>>,
}

/// Statistics and drawing input of one (run, subgroup) cell.
#[derive(Debug, Clone)]
pub struct Cell {
    pub point_count: usize,
    /// NaN when the cell is empty.
    pub spread: f64,
    pub series: Vec<Series>,
    /// Points per colour key, over every key of the colour map.
    pub counts: Vec<(CategoryKey, usize)>,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }
}

impl ReportState {
    /// Filter `dataset` for `case` and build the shared colour map.
    pub fn new(
        case: ReportCase,
        dataset: &OffsetDataset,
        params: &Parameters,
        seed_colors: BTreeMap<CategoryKey, Srgb<u8>>,
    ) -> Result<Self, DataError> {
        for col in [Column::RunId, case.subgroup, case.color_by] {
            if !dataset.has_column(col) {
                return Err(DataError::MissingColumn {
                    file: case.view_stem(),
                    column: col.to_string(),
                });
            }
        }

        // Filters on columns the view lacks are not applied, so they are not kept either.
        let mut filters = params.filters.state_for(case.filter_columns);
        filters.retain(|col, _| dataset.has_column(*col));
        let dataset = filter::apply(dataset, &filters);

        let color_keys: BTreeSet<CategoryKey> = dataset
            .unique_values
            .get(&case.color_by)
            .cloned()
            .unwrap_or_default();
        let color_map = ColorMap::with_seed(case.color_by, &color_keys, params.report.color_seed)
            .with_fallback(seed_colors);

        let mut groups: BTreeMap<(CategoryKey, CategoryKey), Vec<usize>> = BTreeMap::new();
        for (i, row) in dataset.rows.iter().enumerate() {
            if let (Some(run), Some(sub)) = (row.key(Column::RunId), row.key(case.subgroup)) {
                groups.entry((run.clone(), sub.clone())).or_default().push(i);
            }
        }

        Ok(ReportState {
            runs: dataset.keys(Column::RunId),
            subgroups: dataset.keys(case.subgroup),
            method: case.spread_method(params.report.spread_method),
            percentile: params.report.percentile,
            tolerance_radius: params.report.tolerance_radius,
            axis_limit: params.report.axis_limit,
            case,
            dataset,
            filters,
            color_map,
            groups,
        })
    }

    fn rows(&self, run: &CategoryKey, subgroup: &CategoryKey) -> Vec<&OffsetRow> {
        self.groups
            .get(&(run.clone(), subgroup.clone()))
            .map(|idx| idx.iter().map(|&i| &self.dataset.rows[i]).collect())
            .unwrap_or_default()
    }

    /// Compute the spread and colour-coded series of one cell.
    pub fn cell(&self, run: &CategoryKey, subgroup: &CategoryKey) -> Cell {
        let rows = self.rows(run, subgroup);
        let samples: Vec<(f64, f64)> = rows.iter().filter_map(|r| r.sample()).collect();
        let xs: Vec<f64> = samples.iter().map(|s| s.0).collect();
        let ys: Vec<f64> = samples.iter().map(|s| s.1).collect();
        let spread = stats::measure_spread(&xs, &ys, self.method, self.percentile);

        let mut by_key: BTreeMap<CategoryKey, Vec<(f64, f64)>> = BTreeMap::new();
        for row in &rows {
            if let (Some(key), Some(sample)) = (row.key(self.case.color_by), row.sample()) {
                by_key.entry(key.clone()).or_default().push(sample);
            }
        }

        let counts = self
            .color_keys()
            .into_iter()
            .map(|k| {
                let n = by_key.get(&k).map_or(0, Vec::len);
                (k, n)
            })
            .collect();

        let series = by_key
            .into_iter()
            .map(|(key, points)| Series {
                color: self.color_map.color_for(&key),
                points,
            })
            .collect();

        Cell {
            point_count: samples.len(),
            spread,
            series,
            counts,
        }
    }

    /// Sorted keys of the colour column in the filtered dataset.
    pub fn color_keys(&self) -> Vec<CategoryKey> {
        self.dataset.keys(self.case.color_by)
    }

    /// Drawing input for a cell; overlays only when the cell has data.
    pub fn chart_spec(&self, cell: &Cell, size: u32) -> ChartSpec {
        let has_data = !cell.is_empty();
        ChartSpec {
            size,
            axis_limit: self.axis_limit,
            series: cell.series.clone(),
            density_radius: (has_data && cell.spread.is_finite()).then(|| 2.0 * cell.spread),
            tolerance_radius: has_data.then_some(self.tolerance_radius),
        }
    }

    pub fn filter_summary(&self) -> Option<String> {
        filter::summary(&self.filters, self.case.filter_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyValue;
    use crate::report::case::{CASE_01, CASE_02, CASE_03};

    fn row(run: &str, spot: &str, pallette: &str, x: f64, y: f64) -> OffsetRow {
        OffsetRow {
            x: Some(x),
            y: Some(y),
            keys: BTreeMap::from([
                (Column::RunId, CategoryKey::from(run)),
                (Column::SpotNumber, CategoryKey::from(spot)),
                (Column::PalletteNumber, CategoryKey::from(pallette)),
            ]),
        }
    }

    fn dataset() -> OffsetDataset {
        OffsetDataset::from_rows(vec![
            row("010", "1", "2", 0.1, 0.0),
            row("010", "2", "2", -0.1, 0.0),
            row("002", "1", "1", 0.05, 0.0),
            row("A1", "1", "1", 999.0, 0.0),
            row("002", "3", "1", 0.0, 999.0),
        ])
    }

    #[test]
    fn test_runs_sorted_numeric_first_and_sentinels_dropped() {
        let state =
            ReportState::new(CASE_02, &dataset(), &Parameters::default(), BTreeMap::new()).unwrap();
        let runs: Vec<&str> = state.runs.iter().map(|k| k.as_str()).collect();
        assert_eq!(runs, vec!["002", "010"]);
        assert_eq!(state.color_keys().len(), 2);
    }

    #[test]
    fn test_cell_spread_and_series() {
        let state =
            ReportState::new(CASE_02, &dataset(), &Parameters::default(), BTreeMap::new()).unwrap();
        let cell = state.cell(&"010".into(), &"2".into());
        assert_eq!(cell.point_count, 2);
        assert!(cell.spread.abs() < 1e-12);
        assert_eq!(cell.series.len(), 2);
        assert_eq!(cell.series[0].color, state.color_map.color_for(&"1".into()));
        assert_eq!(
            cell.counts,
            vec![(CategoryKey::from("1"), 1), (CategoryKey::from("2"), 1)]
        );

        let spec = state.chart_spec(&cell, 300);
        assert_eq!(spec.density_radius, Some(0.0));
        assert_eq!(spec.tolerance_radius, Some(0.2));
    }

    #[test]
    fn test_empty_cell_has_no_overlays() {
        let state =
            ReportState::new(CASE_02, &dataset(), &Parameters::default(), BTreeMap::new()).unwrap();
        let cell = state.cell(&"002".into(), &"2".into());
        assert!(cell.is_empty());
        assert!(cell.spread.is_nan());
        let spec = state.chart_spec(&cell, 200);
        assert_eq!(spec.density_radius, None);
        assert_eq!(spec.tolerance_radius, None);
    }

    #[test]
    fn test_filters_limited_to_case_columns() {
        let mut params = Parameters::default();
        params.filters.pallette_number = Some(vec![KeyValue::Int(2)]);
        // case 01 does not filter on pallette
        let state = ReportState::new(CASE_01, &dataset(), &params, BTreeMap::new()).unwrap();
        assert_eq!(state.dataset.len(), 3);
        let state = ReportState::new(CASE_02, &dataset(), &params, BTreeMap::new()).unwrap();
        assert_eq!(state.dataset.len(), 2);
    }

    #[test]
    fn test_filters_on_absent_columns_are_not_reported() {
        let mut params = Parameters::default();
        params.filters.cassette_numbers = Some(vec![KeyValue::Int(9)]);
        params.filters.spot_numbers = Some(vec![KeyValue::Int(1)]);
        let mut ds = dataset();
        for r in &mut ds.rows {
            r.keys.insert(Column::RowNumber, CategoryKey::from("1"));
        }
        let ds = OffsetDataset::from_rows(ds.rows);

        let state = ReportState::new(CASE_03, &ds, &params, BTreeMap::new()).unwrap();
        assert!(!state.filters.contains_key(&Column::CassetteNumber));
        assert_eq!(state.filter_summary().as_deref(), Some("Spot = [1]"));
        assert_eq!(state.dataset.len(), 2);

        params.filters.spot_numbers = None;
        let state = ReportState::new(CASE_03, &ds, &params, BTreeMap::new()).unwrap();
        assert_eq!(state.filter_summary(), None);
    }

    #[test]
    fn test_missing_subgroup_column_is_an_error() {
        let ds = OffsetDataset::from_rows(vec![OffsetRow {
            x: Some(0.0),
            y: Some(0.0),
            keys: BTreeMap::from([
                (Column::RunId, CategoryKey::from("1")),
                (Column::SpotNumber, CategoryKey::from("1")),
            ]),
        }]);
        let err = ReportState::new(CASE_02, &ds, &Parameters::default(), BTreeMap::new());
        assert!(matches!(err, Err(DataError::MissingColumn { .. })));
    }
}
