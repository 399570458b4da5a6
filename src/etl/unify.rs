use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::table::Table;

pub const PRINTING_PATTERN: &str = "printing_raw_data_report_*.csv";
pub const UNIFIED_PRINTING: &str = "unified_printing.csv";

/// Last `_`-separated token of the file stem: `..._vas_00012.csv` → `00012`.
pub fn run_token(path: &Path) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let last = name.rsplit('_').next().unwrap_or(name);
    last.split('.').next().unwrap_or(last).to_string()
}

/// Run id of a printing report: the token's last five characters as an
/// integer when they parse, otherwise the token unchanged.
pub fn printing_run_id(path: &Path) -> String {
    let token = run_token(path);
    let start = token
        .char_indices()
        .rev()
        .nth(4)
        .map(|(i, _)| i)
        .unwrap_or(0);
    match token[start..].parse::<i64>() {
        Ok(n) => n.to_string(),
        Err(_) => token,
    }
}

/// Sorted matches of `pattern` inside `dir`.
pub fn find_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = dir.join(pattern);
    let full = full.to_string_lossy();
    let mut files: Vec<PathBuf> = glob::glob(&full)
        .with_context(|| format!("bad glob pattern {full}"))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("skipping unreadable path: {e}");
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Concatenate tables on the columns they all share, in the first table's
/// column order.
pub fn concat_common(tables: Vec<Table>) -> Table {
    let Some(first) = tables.first() else {
        return Table::default();
    };
    let common: Vec<String> = first
        .headers
        .iter()
        .filter(|h| tables.iter().all(|t| t.column(h).is_some()))
        .cloned()
        .collect();
    let names: Vec<&str> = common.iter().map(String::as_str).collect();

    let mut out = Table::new(common.clone());
    for t in &tables {
        out.rows.extend(t.select(&names).rows);
    }
    out
}

/// Merge every printing report in `source_dir` into one deduplicated table
/// with a leading `run_id` column. Returns `None` when nothing was readable.
pub fn unify_printing(source_dir: &Path) -> Result<Option<Table>> {
    let mut tables = Vec::new();
    for file in find_files(source_dir, PRINTING_PATTERN)? {
        let mut table = match Table::read_csv(&file) {
            Ok(t) => t,
            Err(e) => {
                warn!("skipping {}: {e:#}", file.display());
                continue;
            }
        };
        if table.is_empty() {
            debug!("skipping empty {}", file.display());
            continue;
        }
        let run_id = printing_run_id(&file);
        debug!("{}: run {run_id}, {} rows", file.display(), table.len());
        table.insert_column(0, "run_id", &run_id);
        tables.push(table);
    }

    if tables.is_empty() {
        warn!("No data to unify in {}", source_dir.display());
        return Ok(None);
    }
    let n_files = tables.len();
    let unified = concat_common(tables).dedup();
    info!(
        "unified {n_files} printing reports into {} rows, {} columns",
        unified.len(),
        unified.headers.len()
    );
    Ok(Some(unified))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_from_file_names() {
        let p = |s: &str| printing_run_id(Path::new(s));
        assert_eq!(p("printing_raw_data_report_vas_00012.csv"), "12");
        assert_eq!(p("printing_raw_data_report_vas_2024100123.csv"), "123");
        assert_eq!(p("printing_raw_data_report_vas_R12A.csv"), "R12A");
        assert_eq!(p("printing_raw_data_report_7.csv"), "7");
    }

    #[test]
    fn test_concat_common_keeps_shared_columns() {
        let a = Table {
            headers: vec!["run_id".into(), "x".into(), "only_a".into()],
            rows: vec![vec!["1".into(), "0.1".into(), "a".into()]],
        };
        let b = Table {
            headers: vec!["x".into(), "run_id".into()],
            rows: vec![vec!["0.2".into(), "2".into()]],
        };
        let t = concat_common(vec![a, b]);
        assert_eq!(t.headers, vec!["run_id", "x"]);
        assert_eq!(
            t.rows,
            vec![
                vec!["1".to_string(), "0.1".to_string()],
                vec!["2".to_string(), "0.2".to_string()]
            ]
        );
    }

    #[test]
    fn test_unify_skips_empty_files_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let header = "SpotNumber,XOffset,YOffset,TaskName2\n";
        std::fs::write(
            dir.path().join("printing_raw_data_report_vas_00001.csv"),
            format!("{header}1,0.01,0.02,B1\n1,0.01,0.02,B1\n2,0.0,0.1,B1\n"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("printing_raw_data_report_vas_00002.csv"),
            header,
        )
        .unwrap();
        std::fs::write(dir.path().join("printing_raw_data_report_vas_00003.csv"), "").unwrap();
        std::fs::write(dir.path().join("unrelated.csv"), header).unwrap();

        let t = unify_printing(dir.path()).unwrap().unwrap();
        assert_eq!(t.headers[0], "run_id");
        assert_eq!(t.len(), 2);
        assert!(t.rows.iter().all(|r| r[0] == "1"));
    }

    #[test]
    fn test_unify_with_no_inputs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(unify_printing(dir.path()).unwrap().is_none());
    }
}
