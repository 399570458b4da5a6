use std::fmt;
use std::path::{Path, PathBuf};

use crate::data::model::Column;
use crate::stats::SpreadMethod;

/// One report variant: which view it reads, how it groups and colours.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportCase {
    /// Two-digit identifier, `01`.
    pub id: &'static str,
    pub title: &'static str,
    /// One chart per (run, subgroup key).
    pub subgroup: Column,
    /// Points are coloured by this column.
    pub color_by: Column,
    /// Columns that `parameters.yaml` may filter on.
    pub filter_columns: &'static [Column],
    /// Method this case always uses, ignoring the configured one.
    pub fixed_method: Option<SpreadMethod>,
    /// Show per-colour-key point counts in sequential captions.
    pub count_summary: bool,
    /// Show the active filters at the top of the document.
    pub filter_summary: bool,
}

pub const CASE_01: ReportCase = ReportCase {
    id: "01",
    title: "Case 01 (XOffset x YOffset)",
    subgroup: Column::SpotNumber,
    color_by: Column::SpotNumber,
    filter_columns: &[Column::SpotNumber, Column::RunId],
    fixed_method: Some(SpreadMethod::StdRadius),
    count_summary: false,
    filter_summary: false,
};

pub const CASE_02: ReportCase = ReportCase {
    id: "02",
    title: "Case 02",
    subgroup: Column::PalletteNumber,
    color_by: Column::SpotNumber,
    filter_columns: &[Column::SpotNumber, Column::RunId, Column::PalletteNumber],
    fixed_method: None,
    count_summary: false,
    filter_summary: false,
};

pub const CASE_03: ReportCase = ReportCase {
    id: "03",
    title: "Case 03",
    subgroup: Column::PalletteNumber,
    color_by: Column::RowNumber,
    filter_columns: &[
        Column::SpotNumber,
        Column::RunId,
        Column::RowNumber,
        Column::CassetteNumber,
    ],
    fixed_method: None,
    count_summary: true,
    filter_summary: true,
};

pub const ALL_CASES: [ReportCase; 3] = [CASE_01, CASE_02, CASE_03];

impl ReportCase {
    pub fn by_id(id: &str) -> Option<ReportCase> {
        let id = id.trim();
        ALL_CASES
            .into_iter()
            .find(|c| c.id == id || c.id.trim_start_matches('0') == id.trim_start_matches('0'))
    }

    pub fn view_stem(&self) -> String {
        format!("view_case_{}", self.id)
    }

    /// First existing `view_case_NN.{csv,json,parquet}` under `views_dir`.
    pub fn find_view(&self, views_dir: &Path) -> Option<PathBuf> {
        ["csv", "json", "parquet"]
            .iter()
            .map(|ext| views_dir.join(format!("{}.{ext}", self.view_stem())))
            .find(|p| p.is_file())
    }

    pub fn output_name(&self, layout: Layout) -> String {
        match layout {
            Layout::Grid => format!("case_{}_grid.html", self.id),
            Layout::Sequential => format!("case_{}.html", self.id),
        }
    }

    pub fn spread_method(&self, configured: SpreadMethod) -> SpreadMethod {
        self.fixed_method.unwrap_or(configured)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Rows = subgroup keys, columns = runs, one compact chart per cell.
    Grid,
    /// One labelled chart per subgroup under per-run headings.
    Sequential,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Grid => write!(f, "grid"),
            Layout::Sequential => write!(f, "sequential"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_id_accepts_short_form() {
        assert_eq!(ReportCase::by_id("2"), Some(CASE_02));
        assert_eq!(ReportCase::by_id("03"), Some(CASE_03));
        assert_eq!(ReportCase::by_id("4"), None);
    }

    #[test]
    fn test_output_names() {
        assert_eq!(CASE_01.output_name(Layout::Grid), "case_01_grid.html");
        assert_eq!(CASE_01.output_name(Layout::Sequential), "case_01.html");
    }

    #[test]
    fn test_case_01_always_uses_std_radius() {
        assert_eq!(
            CASE_01.spread_method(SpreadMethod::RmsRadius),
            SpreadMethod::StdRadius
        );
        assert_eq!(
            CASE_02.spread_method(SpreadMethod::RmsRadius),
            SpreadMethod::RmsRadius
        );
    }

    #[test]
    fn test_find_view_prefers_csv() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(CASE_01.find_view(dir.path()), None);
        std::fs::write(dir.path().join("view_case_01.parquet"), b"").unwrap();
        std::fs::write(dir.path().join("view_case_01.csv"), b"").unwrap();
        assert_eq!(
            CASE_01.find_view(dir.path()),
            Some(dir.path().join("view_case_01.csv"))
        );
    }
}
