//! Per-case views joined from the unified printing table and the cassette
//! layout.

use log::debug;

use super::table::Table;
use crate::data::DataError;

const PRINTING_CASE_02: [&str; 5] = ["run_id", "SpotNumber", "XOffset", "YOffset", "TaskName2"];
const PRINTING_CASE_03: [&str; 6] = [
    "run_id",
    "RowNumber",
    "SpotNumber",
    "XOffset",
    "YOffset",
    "TaskName2",
];

pub fn view_case_01(printing: &Table) -> Table {
    printing
        .select(&["run_id", "SpotNumber", "XOffset", "YOffset"])
        .dedup()
}

fn join_pallettes(printing: &Table, pallettes: &Table) -> Result<Table, DataError> {
    let right = pallettes
        .select(&["pallette_number", "substrate_barcode"])
        .dedup();
    printing.left_join(&right, &["TaskName2"], &["substrate_barcode"])
}

pub fn view_case_02(printing: &Table, pallettes: &Table) -> Result<Table, DataError> {
    let joined = join_pallettes(&printing.select(&PRINTING_CASE_02), pallettes)?;
    debug!("case 02 join: {} -> {} rows", printing.len(), joined.len());
    joined.select_required(
        &["run_id", "SpotNumber", "XOffset", "YOffset", "pallette_number"],
        "view_case_02",
    )
}

pub fn view_case_03(
    printing: &Table,
    pallettes: &Table,
    cassettes: &Table,
) -> Result<Table, DataError> {
    let joined = join_pallettes(&printing.select(&PRINTING_CASE_03), pallettes)?;
    let right = cassettes
        .select(&["cassette_number", "substrate_barcode", "run"])
        .dedup();
    let joined = joined.left_join(&right, &["run_id", "TaskName2"], &["run", "substrate_barcode"])?;
    debug!("case 03 join: {} -> {} rows", printing.len(), joined.len());
    joined.select_required(
        &[
            "run_id",
            "RowNumber",
            "SpotNumber",
            "XOffset",
            "YOffset",
            "cassette_number",
            "pallette_number",
        ],
        "view_case_03",
    )
}
