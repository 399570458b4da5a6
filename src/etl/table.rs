use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};

use crate::data::DataError;

/// A string-typed table: the intermediate form of every ETL step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("opening CSV {}", path.display()))?;
        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("reading headers of {}", path.display()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let width = headers.len();

        let mut rows = Vec::new();
        for (row_no, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("{} row {row_no}", path.display()))?;
            let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
            row.resize(width, String::new());
            rows.push(row);
        }
        Ok(Table { headers, rows })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str, table: &str) -> Result<usize, DataError> {
        self.column(name).ok_or_else(|| DataError::MissingColumn {
            file: table.to_string(),
            column: name.to_string(),
        })
    }

    /// Keep the named columns in the given order, skipping absent ones.
    pub fn select(&self, names: &[&str]) -> Table {
        let idx: Vec<usize> = names.iter().filter_map(|n| self.column(n)).collect();
        Table {
            headers: idx.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        }
    }

    /// Like [`Table::select`] but every column must exist.
    pub fn select_required(&self, names: &[&str], table: &str) -> Result<Table, DataError> {
        for name in names {
            self.require(name, table)?;
        }
        Ok(self.select(names))
    }

    /// Drop repeated rows, keeping the first occurrence.
    pub fn dedup(mut self) -> Table {
        let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(self.rows.len());
        self.rows.retain(|r| seen.insert(r.clone()));
        self
    }

    pub fn insert_column(&mut self, at: usize, name: &str, value: &str) {
        self.headers.insert(at, name.to_string());
        for row in &mut self.rows {
            row.insert(at, value.to_string());
        }
    }

    /// Left join on equal key tuples. Every left row is kept; a left row
    /// matching several right rows is repeated once per match. Right-hand
    /// columns whose name already exists on the left are not added.
    pub fn left_join(
        &self,
        right: &Table,
        left_on: &[&str],
        right_on: &[&str],
    ) -> Result<Table, DataError> {
        let left_idx = left_on
            .iter()
            .map(|n| self.require(n, "left table"))
            .collect::<Result<Vec<_>, _>>()?;
        let right_idx = right_on
            .iter()
            .map(|n| right.require(n, "right table"))
            .collect::<Result<Vec<_>, _>>()?;

        let extra: Vec<usize> = (0..right.headers.len())
            .filter(|&i| self.column(&right.headers[i]).is_none())
            .collect();

        let mut index: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            let key: Vec<&str> = right_idx.iter().map(|&c| row[c].as_str()).collect();
            index.entry(key).or_default().push(i);
        }

        let mut headers = self.headers.clone();
        headers.extend(extra.iter().map(|&i| right.headers[i].clone()));

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let key: Vec<&str> = left_idx.iter().map(|&c| row[c].as_str()).collect();
            match index.get(&key) {
                Some(matches) => {
                    for &m in matches {
                        let mut joined = row.clone();
                        joined.extend(extra.iter().map(|&i| right.rows[m][i].clone()));
                        rows.push(joined);
                    }
                }
                None => {
                    let mut joined = row.clone();
                    joined.resize(headers.len(), String::new());
                    rows.push(joined);
                }
            }
        }
        Ok(Table { headers, rows })
    }
}
