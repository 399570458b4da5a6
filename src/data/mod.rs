/// Data layer: view tables, loading, and filtering.
///
/// Architecture:
/// ```text
///  view_case_NN.csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → OffsetDataset
///   └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ OffsetDataset │  Vec<OffsetRow>, unique keys per column
///   └───────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop 999.0 sentinels, apply inclusion sets
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;

use thiserror::Error;

/// Errors raised while reading tabular inputs.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("{file}: missing required column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("{file}: column '{column}' has unsupported type {data_type}")]
    UnsupportedColumnType {
        file: String,
        column: String,
        data_type: String,
    },
}
