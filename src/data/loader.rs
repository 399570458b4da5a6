use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CategoryKey, Column, OffsetDataset, OffsetRow};
use super::DataError;

pub const X_COLUMN: &str = "XOffset";
pub const Y_COLUMN: &str = "YOffset";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a view table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row; `XOffset`, `YOffset` plus identifier columns
/// * `.json`    – `[{ "run_id": "12", "XOffset": 0.01, ... }, ...]`
/// * `.parquet` – flat columns with the same names (strings or numbers)
pub fn load_file(path: &Path) -> Result<OffsetDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => Err(DataError::UnsupportedExtension(other.to_string()).into()),
    }?;
    debug!("{}: loaded {} rows", path.display(), dataset.len());
    Ok(dataset)
}

/// Lenient numeric coercion: anything that is not a number becomes `None`.
pub fn parse_offset(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

fn missing_column(path: &Path, column: &str) -> anyhow::Error {
    DataError::MissingColumn {
        file: path.display().to_string(),
        column: column.to_string(),
    }
    .into()
}

/// Map every identifier column to the index of its first matching header.
fn key_columns(headers: &[String]) -> Vec<(Column, usize)> {
    Column::ALL
        .iter()
        .filter_map(|col| {
            col.headers()
                .iter()
                .find_map(|name| headers.iter().position(|h| h.trim() == *name))
                .map(|idx| (*col, idx))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<OffsetDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let x_idx = headers
        .iter()
        .position(|h| h.trim() == X_COLUMN)
        .ok_or_else(|| missing_column(path, X_COLUMN))?;
    let y_idx = headers
        .iter()
        .position(|h| h.trim() == Y_COLUMN)
        .ok_or_else(|| missing_column(path, Y_COLUMN))?;
    let keys = key_columns(&headers);

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let mut row_keys = BTreeMap::new();
        for (col, idx) in &keys {
            if let Some(value) = record.get(*idx).filter(|v| !v.trim().is_empty()) {
                row_keys.insert(*col, CategoryKey::new(value));
            }
        }

        rows.push(OffsetRow {
            x: record.get(x_idx).and_then(parse_offset),
            y: record.get(y_idx).and_then(parse_offset),
            keys: row_keys,
        });
    }

    Ok(OffsetDataset::from_rows(rows))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the shape `df.to_json(orient='records')` produces.
fn load_json(path: &Path) -> Result<OffsetDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        if i == 0 {
            for name in [X_COLUMN, Y_COLUMN] {
                if !obj.contains_key(name) {
                    return Err(missing_column(path, name));
                }
            }
        }

        let mut keys = BTreeMap::new();
        for (name, val) in obj {
            let Some(col) = Column::ALL.iter().find(|c| c.matches_header(name)) else {
                continue;
            };
            if let Some(text) = json_text(val) {
                keys.entry(*col).or_insert_with(|| CategoryKey::new(text));
            }
        }

        rows.push(OffsetRow {
            x: obj.get(X_COLUMN).and_then(json_number),
            y: obj.get(Y_COLUMN).and_then(json_number),
            keys,
        });
    }

    Ok(OffsetDataset::from_rows(rows))
}

fn json_number(val: &JsonValue) -> Option<f64> {
    match val {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => parse_offset(s),
        _ => None,
    }
}

fn json_text(val: &JsonValue) -> Option<String> {
    match val {
        JsonValue::String(s) if s.trim().is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet view. Offsets may be float, integer or string
/// columns; identifier columns may be string or integer columns.
fn load_parquet(path: &Path) -> Result<OffsetDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let x_idx = schema
            .index_of(X_COLUMN)
            .map_err(|_| missing_column(path, X_COLUMN))?;
        let y_idx = schema
            .index_of(Y_COLUMN)
            .map_err(|_| missing_column(path, Y_COLUMN))?;

        let headers: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let keys = key_columns(&headers);

        let x_col = batch.column(x_idx);
        let y_col = batch.column(y_idx);
        for (idx, name) in [(x_idx, X_COLUMN), (y_idx, Y_COLUMN)] {
            check_supported(path, name, batch.column(idx))?;
        }
        for (col, idx) in &keys {
            check_supported(path, &col.to_string(), batch.column(*idx))?;
        }

        for row in 0..batch.num_rows() {
            let mut row_keys = BTreeMap::new();
            for (col, idx) in &keys {
                if let Some(text) = cell_text(batch.column(*idx), row) {
                    row_keys.insert(*col, CategoryKey::new(text));
                }
            }
            rows.push(OffsetRow {
                x: cell_f64(x_col, row),
                y: cell_f64(y_col, row),
                keys: row_keys,
            });
        }
    }

    Ok(OffsetDataset::from_rows(rows))
}

// -- Parquet / Arrow helpers --

fn check_supported(path: &Path, name: &str, col: &Arc<dyn Array>) -> Result<()> {
    match col.data_type() {
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Int32
        | DataType::Int64
        | DataType::Float32
        | DataType::Float64 => Ok(()),
        other => Err(DataError::UnsupportedColumnType {
            file: path.display().to_string(),
            column: name.to_string(),
            data_type: format!("{other:?}"),
        }
        .into()),
    }
}

/// Read a cell as text, rendering integral floats without a fraction.
fn cell_text(col: &Arc<dyn Array>, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    let text = match col.data_type() {
        DataType::Utf8 => col.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => col.as_string::<i64>().value(row).to_string(),
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row).to_string(),
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row).to_string(),
        DataType::Float32 => format_float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => format_float(col.as_primitive::<Float64Type>().value(row)),
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

fn cell_f64(col: &Arc<dyn Array>, row: usize) -> Option<f64> {
    if col.is_null(row) {
        return None;
    }
    let v = match col.data_type() {
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row),
        DataType::Float32 => col.as_primitive::<Float32Type>().value(row) as f64,
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row) as f64,
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row) as f64,
        DataType::Utf8 | DataType::LargeUtf8 => return cell_text(col, row).and_then(|s| parse_offset(&s)),
        _ => return None,
    };
    (!v.is_nan()).then_some(v)
}

pub(crate) fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv_coerces_bad_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "view.csv",
            "run_id,SpotNumber,XOffset,YOffset\n12,3,0.01,-0.02\n12,4,abc,0.1\n13,3,,0.0\n",
        );
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.rows[0].sample(), Some((0.01, -0.02)));
        assert_eq!(ds.rows[1].x, None);
        assert_eq!(ds.rows[2].x, None);
        assert_eq!(ds.columns, vec![Column::RunId, Column::SpotNumber]);
    }

    #[test]
    fn test_empty_key_cells_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "v.csv",
            "run_id,SpotNumber,XOffset,YOffset,pallette_number\n1,1,0,0,4\n1,2,0,0,\n",
        );
        let ds = load_file(&path).unwrap();
        assert!(ds.rows[1].key(Column::PalletteNumber).is_none());
        assert_eq!(ds.keys(Column::PalletteNumber), vec![CategoryKey::from("4")]);
    }

    #[test]
    fn test_load_csv_accepts_spot_number_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "v.csv", "run_id,spot_number,XOffset,YOffset\n1,7,0,0\n");
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.rows[0].key(Column::SpotNumber).map(|k| k.as_str()), Some("7"));
    }

    #[test]
    fn test_load_csv_requires_offset_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "v.csv", "run_id,SpotNumber,XOffset\n1,2,0.0\n");
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("YOffset"));
    }

    #[test]
    fn test_load_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "v.json",
            r#"[{"run_id": 12, "SpotNumber": "1", "XOffset": 0.05, "YOffset": "0.01"},
                {"run_id": 12, "SpotNumber": "2", "XOffset": null, "YOffset": 0.0}]"#,
        );
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.rows[0].sample(), Some((0.05, 0.01)));
        assert_eq!(ds.rows[0].key(Column::RunId).map(|k| k.as_str()), Some("12"));
        assert_eq!(ds.rows[1].sample(), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_file(Path::new("view.xlsx")).unwrap_err();
        assert!(err.to_string().contains("unsupported file extension"));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(12.0), "12");
        assert_eq!(format_float(0.25), "0.25");
    }
}
