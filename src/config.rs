//! Report parameters loaded from `parameters.yaml`.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::FilterState;
use crate::data::model::{CategoryKey, Column};
use crate::stats::{SpreadMethod, DEFAULT_PERCENTILE};

/// A filter entry as written in YAML: `12`, `"A1"` or `1.0` all work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl KeyValue {
    pub fn to_key(&self) -> CategoryKey {
        match self {
            KeyValue::Int(i) => CategoryKey::new(i.to_string()),
            KeyValue::Float(f) => CategoryKey::new(crate::data::loader::format_float(*f)),
            KeyValue::Text(s) => CategoryKey::new(s.as_str()),
        }
    }
}

/// Inclusion sets per identifier. Absent or empty lists disable a filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub spot_numbers: Option<Vec<KeyValue>>,
    #[serde(default)]
    pub run_id: Option<Vec<KeyValue>>,
    #[serde(default)]
    pub pallette_number: Option<Vec<KeyValue>>,
    #[serde(default)]
    pub row_numbers: Option<Vec<KeyValue>>,
    #[serde(default)]
    pub cassette_numbers: Option<Vec<KeyValue>>,
}

impl Filters {
    fn entries(&self) -> [(Column, &Option<Vec<KeyValue>>); 5] {
        [
            (Column::SpotNumber, &self.spot_numbers),
            (Column::RunId, &self.run_id),
            (Column::PalletteNumber, &self.pallette_number),
            (Column::RowNumber, &self.row_numbers),
            (Column::CassetteNumber, &self.cassette_numbers),
        ]
    }

    /// Filter state restricted to the given columns.
    pub fn state_for(&self, columns: &[Column]) -> FilterState {
        self.entries()
            .into_iter()
            .filter(|(col, _)| columns.contains(col))
            .filter_map(|(col, values)| {
                let set: BTreeSet<CategoryKey> =
                    values.as_ref()?.iter().map(KeyValue::to_key).collect();
                (!set.is_empty()).then_some((col, set))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    #[serde(default)]
    pub spread_method: SpreadMethod,

    #[serde(default = "default_percentile")]
    pub percentile: f64,

    /// Shuffle seed for palettes of more than 12 keys; derived from the
    /// keys when absent.
    #[serde(default)]
    pub color_seed: Option<u64>,

    /// Radius of the process tolerance circle.
    #[serde(default = "default_tolerance_radius")]
    pub tolerance_radius: f64,

    /// Half-width of the fixed, shared axis range.
    #[serde(default = "default_axis_limit")]
    pub axis_limit: f64,
}

fn default_percentile() -> f64 {
    DEFAULT_PERCENTILE
}

fn default_tolerance_radius() -> f64 {
    0.2
}

fn default_axis_limit() -> f64 {
    0.3
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            spread_method: SpreadMethod::default(),
            percentile: default_percentile(),
            color_seed: None,
            tolerance_radius: default_tolerance_radius(),
            axis_limit: default_axis_limit(),
        }
    }
}

/// Top-level parameters document. Filters sit at the top level, report
/// options under `report:`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(flatten)]
    pub filters: Filters,

    #[serde(default)]
    pub report: ReportOptions,
}

impl Parameters {
    /// Load parameters from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty document deserializes to null; treat it as defaults.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
