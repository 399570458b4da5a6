/// Report layer: per-case chart composition and HTML output.
///
/// ```text
///  OffsetDataset ──▶ ReportState (filter, colour map, groups)
///                         │
///            ┌────────────┴────────────┐
///            ▼                         ▼
///       grid layout              sequential layout
///            └────────────┬────────────┘
///                         ▼
///               html::Document ──▶ case_NN[_grid].html
/// ```

pub mod case;
pub mod chart;
pub mod html;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use palette::Srgb;

use crate::config::Parameters;
use crate::data::loader;
use crate::data::model::CategoryKey;
use crate::state::{Cell, ReportState};
use crate::stats::{self, SpreadMethod};
use case::{Layout, ReportCase};
use chart::{ChartError, GRID_SIZE, SEQUENTIAL_SIZE};
use html::{Body, Document, GridCell, GridRow, Panel, RunSection};

/// `Std Radius: 0.0123 (2σ circle)`, or `No data` for an undefined spread.
pub fn metric_text(method: SpreadMethod, percentile: f64, spread: f64) -> String {
    if spread.is_nan() {
        return "No data".to_string();
    }
    match method {
        SpreadMethod::StdRadius => format!("Std Radius: {spread:.4} (2σ circle)"),
        SpreadMethod::RmsRadius => format!("RMS Radius: {spread:.4} (2× circle)"),
        SpreadMethod::PercentileRadius => {
            format!("P{percentile} Radius: {spread:.4} (2× circle)")
        }
    }
}

fn count_summary(state: &ReportState, cell: &Cell) -> String {
    let label = state.case.color_by.label();
    cell.counts
        .iter()
        .map(|(key, n)| format!("{label} {key}: {n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn grid_body(state: &ReportState) -> Result<Body, ChartError> {
    let label = state.case.subgroup.label();
    let mut rows = Vec::with_capacity(state.subgroups.len());
    for sub in &state.subgroups {
        let mut cells = Vec::with_capacity(state.runs.len());
        for run in &state.runs {
            let cell = state.cell(run, sub);
            if cell.is_empty() {
                cells.push(GridCell::NoData);
                continue;
            }
            let uri = chart::render_data_uri(&state.chart_spec(&cell, GRID_SIZE))?;
            cells.push(GridCell::Chart(uri));
        }
        rows.push(GridRow {
            label: format!("{label} {sub}"),
            cells,
        });
    }
    Ok(Body::Grid {
        runs: state.runs.iter().map(|r| r.to_string()).collect(),
        rows,
    })
}

fn sequential_body(state: &ReportState) -> Result<Body, ChartError> {
    let label = state.case.subgroup.label();
    let mut sections = Vec::with_capacity(state.runs.len());
    for run in &state.runs {
        let mut panels = Vec::new();
        let mut spreads = Vec::new();
        for sub in &state.subgroups {
            let cell = state.cell(run, sub);
            if cell.is_empty() {
                continue;
            }
            spreads.push(cell.spread);

            let mut caption = vec![
                format!("{label} {sub}"),
                metric_text(state.method, state.percentile, cell.spread),
            ];
            if state.case.count_summary {
                caption.push("Data point count:".to_string());
                caption.push(count_summary(state, &cell));
            }
            let image = chart::render_data_uri(&state.chart_spec(&cell, SEQUENTIAL_SIZE))?;
            panels.push(Panel { caption, image });
        }

        let average = stats::mean_defined(&spreads)
            .map(|avg| format!("Run {run} average {}: {avg:.4}", state.method.label()));
        debug!("run {run}: {} charts, average {:?}", panels.len(), average);
        sections.push(RunSection {
            run: run.to_string(),
            average,
            panels,
        });
    }
    Ok(Body::Sequential(sections))
}

/// Compose the document for one layout.
pub fn build_document(state: &ReportState, layout: Layout) -> Result<Document, ChartError> {
    let case = &state.case;
    let (heading, body) = match layout {
        Layout::Grid => (
            format!("Case {} Grid Layout", case.id),
            grid_body(state)?,
        ),
        Layout::Sequential => (case.title.to_string(), sequential_body(state)?),
    };
    Ok(Document {
        title: format!("Case {} Charts", case.id),
        heading,
        filter_summary: if case.filter_summary {
            state.filter_summary()
        } else {
            None
        },
        legend_label: case.color_by.label().to_string(),
        density_label: state.method.label(),
        tolerance_radius: state.tolerance_radius,
        legend: state.color_map.legend_entries(),
        body,
    })
}

pub fn render_report(state: &ReportState, layout: Layout) -> Result<String> {
    let doc = build_document(state, layout)
        .with_context(|| format!("drawing case {} ({layout})", state.case.id))?;
    Ok(html::render(&doc)?)
}

/// Load the case's view, render every requested layout and write the files.
/// Nothing is written unless every layout rendered.
pub fn generate_case(
    case: &ReportCase,
    views_dir: &Path,
    out_dir: &Path,
    layouts: &[Layout],
    params: &Parameters,
    seed_colors: &BTreeMap<CategoryKey, Srgb<u8>>,
) -> Result<Vec<PathBuf>> {
    let view = case
        .find_view(views_dir)
        .with_context(|| format!("no {} view in {}", case.view_stem(), views_dir.display()))?;
    let dataset = loader::load_file(&view)?;
    let state = ReportState::new(case.clone(), &dataset, params, seed_colors.clone())?;
    info!(
        "case {}: {} rows after filtering, {} runs, {} {} groups",
        case.id,
        state.dataset.len(),
        state.runs.len(),
        state.subgroups.len(),
        case.subgroup.label().to_lowercase()
    );

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let rendered = layouts
        .iter()
        .map(|&layout| -> Result<(String, String)> {
            Ok((case.output_name(layout), render_report(&state, layout)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut written = Vec::with_capacity(rendered.len());
    for (name, html) in rendered {
        let path = out_dir.join(name);
        std::fs::write(&path, html).with_context(|| format!("writing {}", path.display()))?;
        info!("Charts saved to {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyValue;
    use crate::data::model::{Column, OffsetDataset, OffsetRow};
    use case::{CASE_01, CASE_03};

    fn row(run: &str, spot: &str, row_no: &str, pallette: &str, x: f64, y: f64) -> OffsetRow {
        OffsetRow {
            x: Some(x),
            y: Some(y),
            keys: BTreeMap::from([
                (Column::RunId, CategoryKey::from(run)),
                (Column::SpotNumber, CategoryKey::from(spot)),
                (Column::RowNumber, CategoryKey::from(row_no)),
                (Column::PalletteNumber, CategoryKey::from(pallette)),
                (Column::CassetteNumber, CategoryKey::from("1")),
            ]),
        }
    }

    fn dataset() -> OffsetDataset {
        OffsetDataset::from_rows(vec![
            row("12", "1", "1", "1", 0.01, 0.02),
            row("12", "2", "2", "1", -0.02, 0.01),
            row("12", "1", "1", "2", 0.03, -0.01),
            row("3", "2", "2", "2", 0.0, 0.05),
            row("3", "1", "1", "2", 999.0, 0.05),
        ])
    }

    fn state(case: ReportCase) -> ReportState {
        ReportState::new(case, &dataset(), &Parameters::default(), BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_metric_text() {
        assert_eq!(
            metric_text(SpreadMethod::StdRadius, 95.0, 0.01234),
            "Std Radius: 0.0123 (2σ circle)"
        );
        assert_eq!(metric_text(SpreadMethod::RmsRadius, 95.0, f64::NAN), "No data");
        assert_eq!(
            metric_text(SpreadMethod::PercentileRadius, 95.0, 0.5),
            "P95 Radius: 0.5000 (2× circle)"
        );
    }

    #[test]
    fn test_grid_and_sequential_share_colours() {
        let state = state(CASE_01);
        let grid = build_document(&state, Layout::Grid).unwrap();
        let seq = build_document(&state, Layout::Sequential).unwrap();
        assert_eq!(grid.legend, seq.legend);

        for run in &state.runs {
            for sub in &state.subgroups {
                let a = state.chart_spec(&state.cell(run, sub), GRID_SIZE);
                let b = state.chart_spec(&state.cell(run, sub), SEQUENTIAL_SIZE);
                let ca: Vec<_> = a.series.iter().map(|s| s.color).collect();
                let cb: Vec<_> = b.series.iter().map(|s| s.color).collect();
                assert_eq!(ca, cb);
            }
        }
    }

    #[test]
    fn test_grid_layout_shape() {
        let state = state(CASE_01);
        let doc = build_document(&state, Layout::Grid).unwrap();
        let Body::Grid { runs, rows } = doc.body else {
            panic!("expected grid body");
        };
        assert_eq!(runs, vec!["3", "12"]);
        assert_eq!(rows.len(), 2);
        // spot 1 has no measured point in run 3
        assert!(matches!(rows[0].cells[0], GridCell::NoData));
        assert!(matches!(rows[0].cells[1], GridCell::Chart(_)));
    }

    #[test]
    fn test_sequential_sections_and_averages() {
        let state = state(CASE_01);
        let doc = build_document(&state, Layout::Sequential).unwrap();
        let Body::Sequential(sections) = doc.body else {
            panic!("expected sequential body");
        };
        let runs: Vec<&str> = sections.iter().map(|s| s.run.as_str()).collect();
        assert_eq!(runs, vec!["3", "12"]);
        // run 3: only spot 2 has data, single point → std 0
        assert_eq!(sections[0].panels.len(), 1);
        assert_eq!(
            sections[0].average.as_deref(),
            Some("Run 3 average std radius: 0.0000")
        );
        assert_eq!(sections[1].panels.len(), 2);
        assert_eq!(sections[1].panels[0].caption[0], "Spot 1");
    }

    #[test]
    fn test_case_03_counts_and_filter_summary() {
        let mut params = Parameters::default();
        params.filters.row_numbers = Some(vec![KeyValue::Int(1), KeyValue::Int(2)]);
        let state = ReportState::new(CASE_03, &dataset(), &params, BTreeMap::new()).unwrap();
        let doc = build_document(&state, Layout::Sequential).unwrap();
        assert_eq!(doc.filter_summary.as_deref(), Some("Row = [1, 2]"));
        assert_eq!(doc.legend_label, "Row");
        let Body::Sequential(sections) = doc.body else {
            panic!("expected sequential body");
        };
        let run12 = &sections[1];
        assert_eq!(run12.panels[0].caption[0], "Pallette 1");
        assert_eq!(run12.panels[0].caption[3], "Row 1: 1, Row 2: 1");
        assert_eq!(run12.panels[1].caption[3], "Row 1: 1, Row 2: 0");
    }

    #[test]
    fn test_sentinel_rows_never_plotted() {
        let state = state(CASE_01);
        for run in &state.runs {
            for sub in &state.subgroups {
                let cell = state.cell(run, sub);
                for series in &cell.series {
                    assert!(series.points.iter().all(|&(x, y)| x != 999.0 && y != 999.0));
                }
            }
        }
        let total: usize = state
            .runs
            .iter()
            .flat_map(|r| state.subgroups.iter().map(move |s| (r, s)))
            .map(|(r, s)| state.cell(r, s).point_count)
            .sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_generate_case_writes_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let views = dir.path().join("views");
        let out = dir.path().join("charts");
        std::fs::create_dir_all(&views).unwrap();
        std::fs::write(
            views.join("view_case_01.csv"),
            "run_id,SpotNumber,XOffset,YOffset\n1,1,0.01,0.02\n1,2,999.0,0.1\n2,1,-0.03,0.0\n",
        )
        .unwrap();

        let written = generate_case(
            &CASE_01,
            &views,
            &out,
            &[Layout::Sequential, Layout::Grid],
            &Parameters::default(),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(written, vec![out.join("case_01.html"), out.join("case_01_grid.html")]);

        let html = std::fs::read_to_string(out.join("case_01.html")).unwrap();
        assert!(html.contains("Spot Color Legend"));
        assert!(html.contains("data:image/png;base64,"));
        // spot 2 only had a sentinel row, so it is not in the legend
        assert!(html.contains("</span> 1 "));
        assert!(!html.contains("</span> 2 "));
    }

    #[test]
    fn test_generate_case_without_view_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("charts");
        let err = generate_case(
            &CASE_01,
            dir.path(),
            &out,
            &[Layout::Grid],
            &Parameters::default(),
            &BTreeMap::new(),
        );
        assert!(err.is_err());
        assert!(!out.join("case_01_grid.html").exists());
    }
}
