use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Placeholder the measurement export writes when no offset was measured.
pub const MISSING_OFFSET: f64 = 999.0;

// ---------------------------------------------------------------------------
// CategoryKey – run / spot / row / pallette / cassette identifier
// ---------------------------------------------------------------------------

/// An identifier cell kept as text, ordered numeric-first.
///
/// Keys whose text parses as an integer sort before every other key and are
/// compared by value; all remaining keys compare lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryKey(String);

impl CategoryKey {
    pub fn new(raw: impl Into<String>) -> Self {
        CategoryKey(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sign and significant digits when the key is an integer of any length.
    /// Zero is `(false, "")`.
    fn integer_parts(&self) -> Option<(bool, &str)> {
        let (negative, digits) = match self.0.as_bytes().first() {
            Some(b'-') => (true, &self.0[1..]),
            Some(b'+') => (false, &self.0[1..]),
            _ => (false, self.0.as_str()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let significant = digits.trim_start_matches('0');
        Some((negative && !significant.is_empty(), significant))
    }
}

fn cmp_integers(a: (bool, &str), b: (bool, &str)) -> Ordering {
    let magnitude = a.1.len().cmp(&b.1.len()).then_with(|| a.1.cmp(b.1));
    match (a.0, b.0) {
        (false, false) => magnitude,
        (true, true) => magnitude.reverse(),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
    }
}

impl From<&str> for CategoryKey {
    fn from(s: &str) -> Self {
        CategoryKey::new(s)
    }
}

impl From<String> for CategoryKey {
    fn from(s: String) -> Self {
        CategoryKey::new(s)
    }
}

impl PartialOrd for CategoryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CategoryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.integer_parts(), other.integer_parts()) {
            // "2" and "02" share a value; fall back to text to stay consistent with Eq.
            (Some(a), Some(b)) => cmp_integers(a, b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Column – the identifier columns a view can carry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    RunId,
    SpotNumber,
    RowNumber,
    PalletteNumber,
    CassetteNumber,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::RunId,
        Column::SpotNumber,
        Column::RowNumber,
        Column::PalletteNumber,
        Column::CassetteNumber,
    ];

    /// Header names accepted for this column, preferred spelling first.
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            Column::RunId => &["run_id"],
            Column::SpotNumber => &["SpotNumber", "spot_number"],
            Column::RowNumber => &["RowNumber", "row_number"],
            Column::PalletteNumber => &["pallette_number"],
            Column::CassetteNumber => &["cassette_number"],
        }
    }

    /// Human label used in headings and legends.
    pub fn label(self) -> &'static str {
        match self {
            Column::RunId => "Run",
            Column::SpotNumber => "Spot",
            Column::RowNumber => "Row",
            Column::PalletteNumber => "Pallette",
            Column::CassetteNumber => "Cassette",
        }
    }

    pub fn matches_header(self, header: &str) -> bool {
        self.headers().iter().any(|h| *h == header.trim())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headers()[0])
    }
}

// ---------------------------------------------------------------------------
// OffsetRow – one measured spot of one substrate in one run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OffsetRow {
    /// `None` when the cell was empty or not a number.
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub keys: BTreeMap<Column, CategoryKey>,
}

impl OffsetRow {
    pub fn key(&self, column: Column) -> Option<&CategoryKey> {
        self.keys.get(&column)
    }

    /// The offset pair if both axes hold a real measurement.
    pub fn sample(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y))
                if x.is_finite() && y.is_finite() && x != MISSING_OFFSET && y != MISSING_OFFSET =>
            {
                Some((x, y))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// OffsetDataset – a loaded view table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct OffsetDataset {
    pub rows: Vec<OffsetRow>,
    /// Identifier columns present in the source table.
    pub columns: Vec<Column>,
    /// For each identifier column the sorted set of unique keys.
    pub unique_values: BTreeMap<Column, BTreeSet<CategoryKey>>,
}

impl OffsetDataset {
    /// Build column indices from loaded rows.
    pub fn from_rows(rows: Vec<OffsetRow>) -> Self {
        let mut columns: BTreeSet<Column> = BTreeSet::new();
        let mut unique_values: BTreeMap<Column, BTreeSet<CategoryKey>> = BTreeMap::new();

        for row in &rows {
            for (col, key) in &row.keys {
                columns.insert(*col);
                unique_values.entry(*col).or_default().insert(key.clone());
            }
        }

        OffsetDataset {
            rows,
            columns: columns.into_iter().collect(),
            unique_values,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Sorted unique keys of a column; empty if the column is absent.
    pub fn keys(&self, column: Column) -> Vec<CategoryKey> {
        self.unique_values
            .get(&column)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}
