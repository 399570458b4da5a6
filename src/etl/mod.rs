/// Data preparation: raw printing reports and run-parameter templates in,
/// per-case view tables out.
///
/// ```text
///  source_data/printing_raw_data_report_*.csv ──▶ processed/unified_printing.csv ─┐
///  source_data/run_parameters_template_*.xlsx ──▶ processed/cassette_table.csv ──┤
///                                                processed/pallette_table.csv ───┤
///                                                                                ▼
///                                                        views/view_case_0{1,2,3}.csv
/// ```
pub mod cassette;
pub mod table;
pub mod unify;
pub mod views;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use table::Table;

pub const SOURCE_DIR: &str = "source_data";
pub const PROCESSED_DIR: &str = "processed";
pub const VIEWS_DIR: &str = "views";

pub const CASSETTE_TABLE: &str = "cassette_table.csv";
pub const PALLETTE_TABLE: &str = "pallette_table.csv";

/// Layout of the data directory.
#[derive(Debug, Clone)]
pub struct DataDirs {
    pub source: PathBuf,
    pub processed: PathBuf,
    pub views: PathBuf,
}

impl DataDirs {
    pub fn new(root: &Path) -> Self {
        DataDirs {
            source: root.join(SOURCE_DIR),
            processed: root.join(PROCESSED_DIR),
            views: root.join(VIEWS_DIR),
        }
    }
}

fn write(table: &Table, path: &Path) -> Result<()> {
    table.write_csv(path)?;
    info!("{} rows saved to {}", table.len(), path.display());
    Ok(())
}

/// Cassette table from the templates, or the previously written one when
/// there are no templates.
fn cassette_table(dirs: &DataDirs) -> Result<Option<Table>> {
    let out = dirs.processed.join(CASSETTE_TABLE);
    if let Some(table) = cassette::build_cassette_table(&dirs.source)? {
        write(&table, &out)?;
        return Ok(Some(table));
    }
    if out.exists() {
        info!("no run parameter templates, keeping {}", out.display());
        return Ok(Some(Table::read_csv(&out)?));
    }
    warn!("no run parameter templates in {}", dirs.source.display());
    Ok(None)
}

/// Run the whole preparation stage. Returns the view files written.
pub fn run_all(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let dirs = DataDirs::new(data_dir);
    for dir in [&dirs.processed, &dirs.views] {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let Some(printing) = unify::unify_printing(&dirs.source)? else {
        return Ok(Vec::new());
    };
    write(&printing, &dirs.processed.join(unify::UNIFIED_PRINTING))?;

    let mut written = Vec::new();
    let path = dirs.views.join("view_case_01.csv");
    write(&views::view_case_01(&printing), &path)?;
    written.push(path);

    let Some(cassettes) = cassette_table(&dirs)? else {
        warn!("skipping case 02 and 03 views: no cassette table");
        return Ok(written);
    };
    let pallettes = cassette::pallette_table(&cassettes)?;
    write(&pallettes, &dirs.processed.join(PALLETTE_TABLE))?;

    let path = dirs.views.join("view_case_02.csv");
    write(&views::view_case_02(&printing, &pallettes)?, &path)?;
    written.push(path);

    let path = dirs.views.join("view_case_03.csv");
    write(&views::view_case_03(&printing, &pallettes, &cassettes)?, &path)?;
    written.push(path);

    Ok(written)
}
