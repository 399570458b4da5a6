//! Cassette layout scraped from run-parameter spreadsheet templates.
//!
//! Each template holds one cassette per column pair (A/B, D/E, G/H, ...):
//!
//! ```text
//!   row 5   cassette number
//!   row 6   cassette code         (pair skipped when empty)
//!   row 7+  substrate barcode | pallette number   (until both are empty)
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use log::{debug, info, warn};

use super::table::Table;
use super::unify::{find_files, run_token};
use crate::data::loader::format_float;

pub const TEMPLATE_PATTERN: &str = "run_parameters_template_*.xlsx";

pub const CASSETTE_COLUMNS: [&str; 5] = [
    "cassette_number",
    "cassette_code",
    "substrate_barcode",
    "pallette_number",
    "run",
];

const NUMBER_ROW: u32 = 5;
const CODE_ROW: u32 = 6;
const FIRST_SUBSTRATE_ROW: u32 = 7;
const PAIR_STRIDE: u32 = 3;

/// Read access to a sheet with 1-based row/column numbers.
pub trait CellSource {
    /// Cell text, `None` when the cell is empty.
    fn cell(&self, row: u32, col: u32) -> Option<String>;
    /// Highest used column, 1-based.
    fn max_column(&self) -> u32;
}

impl CellSource for Range<Data> {
    fn cell(&self, row: u32, col: u32) -> Option<String> {
        if row == 0 || col == 0 {
            return None;
        }
        match self.get_value((row - 1, col - 1))? {
            Data::Empty => None,
            Data::String(s) if s.is_empty() => None,
            Data::Float(f) => Some(format_float(*f)),
            Data::Int(i) => Some(i.to_string()),
            other => Some(other.to_string()),
        }
    }

    fn max_column(&self) -> u32 {
        self.end().map(|(_, c)| c + 1).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CassetteRow {
    pub cassette_number: String,
    pub cassette_code: String,
    pub substrate_barcode: String,
    pub pallette_number: String,
    pub run: String,
}

/// Run of a template: the filename token as an integer when it parses.
pub fn template_run(path: &Path) -> String {
    let token = run_token(path);
    token
        .parse::<i64>()
        .map(|n| n.to_string())
        .unwrap_or(token)
}

/// Scrape every cassette of one sheet.
pub fn scrape_cassettes<S: CellSource>(sheet: &S, run: &str) -> Vec<CassetteRow> {
    let mut out = Vec::new();
    let max_col = sheet.max_column();
    let mut col = 1;
    while col < max_col {
        let number = sheet.cell(NUMBER_ROW, col).unwrap_or_default();
        let Some(code) = sheet.cell(CODE_ROW, col) else {
            col += PAIR_STRIDE;
            continue;
        };

        let mut row = FIRST_SUBSTRATE_ROW;
        loop {
            let barcode = sheet.cell(row, col);
            let pallette = sheet.cell(row, col + 1);
            match (barcode, pallette) {
                (None, None) => break,
                (Some(substrate_barcode), Some(pallette_number)) => out.push(CassetteRow {
                    cassette_number: number.clone(),
                    cassette_code: code.clone(),
                    substrate_barcode,
                    pallette_number,
                    run: run.to_string(),
                }),
                _ => {}
            }
            row += 1;
        }
        col += PAIR_STRIDE;
    }
    out
}

pub fn to_table(rows: &[CassetteRow]) -> Table {
    let mut table = Table::new(CASSETTE_COLUMNS.iter().map(|s| s.to_string()).collect());
    table.rows = rows
        .iter()
        .map(|r| {
            vec![
                r.cassette_number.clone(),
                r.cassette_code.clone(),
                r.substrate_barcode.clone(),
                r.pallette_number.clone(),
                r.run.clone(),
            ]
        })
        .collect();
    table.dedup()
}

fn read_template(path: &Path) -> Result<Vec<CassetteRow>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .with_context(|| format!("{} has no worksheet", path.display()))?
        .with_context(|| format!("reading first sheet of {}", path.display()))?;
    Ok(scrape_cassettes(&range, &template_run(path)))
}

/// Scrape all templates in `source_dir`. Returns `None` when there are no
/// templates at all.
pub fn build_cassette_table(source_dir: &Path) -> Result<Option<Table>> {
    let templates = find_files(source_dir, TEMPLATE_PATTERN)?;
    if templates.is_empty() {
        return Ok(None);
    }
    let mut rows = Vec::new();
    for path in &templates {
        let scraped = read_template(path)?;
        debug!("{}: {} substrates", path.display(), scraped.len());
        rows.extend(scraped);
    }
    let table = to_table(&rows);
    info!(
        "cassette table: {} rows from {} templates",
        table.len(),
        templates.len()
    );
    Ok(Some(table))
}

/// `run, pallette_number, substrate_barcode`, deduplicated.
pub fn pallette_table(cassettes: &Table) -> Result<Table> {
    let table = cassettes
        .select_required(&["run", "pallette_number", "substrate_barcode"], "cassette table")?
        .dedup();
    if table.is_empty() {
        warn!("pallette table is empty");
    }
    Ok(table)
}
