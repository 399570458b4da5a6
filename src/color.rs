use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use palette::{Hsv, IntoColor, Srgb};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::data::model::{CategoryKey, Column};

/// Colour of keys nobody assigned a colour to.
pub const DEFAULT_COLOR: Srgb<u8> = Srgb::new(0, 0, 0);

/// Hand-picked, ordered high-contrast colours for up to 12 categories.
/// Black is left out; it belongs to the density circle.
pub const HIGH_CONTRAST: [Srgb<u8>; 12] = [
    Srgb::new(0xFF, 0xD7, 0x00), // yellow
    Srgb::new(0xFF, 0x00, 0x00), // red
    Srgb::new(0x00, 0xFF, 0xFF), // cyan
    Srgb::new(0x00, 0x00, 0xFF), // blue
    Srgb::new(0x00, 0xFF, 0x00), // lime
    Srgb::new(0xFF, 0x00, 0xFF), // magenta
    Srgb::new(0xFF, 0xA5, 0x00), // orange
    Srgb::new(0x00, 0x80, 0x00), // green
    Srgb::new(0xFF, 0xC0, 0xCB), // pink
    Srgb::new(0x80, 0x00, 0x80), // purple
    Srgb::new(0xA5, 0x2A, 0x2A), // brown
    Srgb::new(0xFF, 0x63, 0x47), // tomato
];

const HSV_SATURATION: f32 = 0.95;
const HSV_VALUE: f32 = 0.95;

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

/// `#RRGGBB`, upper case.
pub fn to_hex(c: Srgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", c.red, c.green, c.blue)
}

pub fn parse_hex(s: &str) -> Option<Srgb<u8>> {
    s.trim().parse::<Srgb<u8>>().ok()
}

// ---------------------------------------------------------------------------
// Colour palette generator
// ---------------------------------------------------------------------------

/// Generates `n` vivid colours from evenly spaced hues, shuffled so that
/// neighbouring keys do not get neighbouring hues.
pub fn generate_palette(n: usize, seed: u64) -> Vec<Srgb<u8>> {
    let mut hues: Vec<f32> = (0..n).map(|i| i as f32 / n as f32).collect();
    hues.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    hues.into_iter()
        .map(|h| {
            let hsv: Hsv = Hsv::new(h * 360.0, HSV_SATURATION, HSV_VALUE);
            let rgb: Srgb = hsv.into_color();
            rgb.into_format::<u8>()
        })
        .collect()
}

/// Stable seed derived from the key list, so the same key set always
/// shuffles the same way.
pub fn seed_for_keys(keys: &[CategoryKey]) -> u64 {
    let text: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
    fxhash::hash64(&text)
}

// ---------------------------------------------------------------------------
// Colour mapping: category key → colour
// ---------------------------------------------------------------------------

/// Maps the keys of one column to distinct colours. Built once per report
/// and shared by every chart and the legend.
#[derive(Debug, Clone)]
pub struct ColorMap {
    /// Keys in assignment (sorted) order.
    order: Vec<CategoryKey>,
    mapping: BTreeMap<CategoryKey, Srgb<u8>>,
    fallback: BTreeMap<CategoryKey, Srgb<u8>>,
    default_color: Srgb<u8>,
}

impl ColorMap {
    /// Colour map over the unique keys of `column`. `seed` overrides the
    /// key-derived shuffle seed used when there are more keys than
    /// high-contrast colours.
    pub fn with_seed(
        column: Column,
        unique_values: &BTreeSet<CategoryKey>,
        seed: Option<u64>,
    ) -> Self {
        let order: Vec<CategoryKey> = unique_values.iter().cloned().collect();
        let colors: Vec<Srgb<u8>> = if order.len() <= HIGH_CONTRAST.len() {
            HIGH_CONTRAST[..order.len()].to_vec()
        } else {
            let seed = seed.unwrap_or_else(|| seed_for_keys(&order));
            debug!("{column}: {} keys, vivid palette with seed {seed}", order.len());
            generate_palette(order.len(), seed)
        };
        let mapping = order.iter().cloned().zip(colors).collect();

        ColorMap {
            order,
            mapping,
            fallback: BTreeMap::new(),
            default_color: DEFAULT_COLOR,
        }
    }

    /// Colours used for keys that were not present when the map was built.
    pub fn with_fallback(mut self, table: BTreeMap<CategoryKey, Srgb<u8>>) -> Self {
        self.fallback = table;
        self
    }

    /// Look up the colour for a given key.
    pub fn color_for(&self, key: &CategoryKey) -> Srgb<u8> {
        self.mapping
            .get(key)
            .or_else(|| self.fallback.get(key))
            .copied()
            .unwrap_or(self.default_color)
    }

    pub fn hex_for(&self, key: &CategoryKey) -> String {
        to_hex(self.color_for(key))
    }

    /// Return the legend entries (key label → hex colour) in assignment order.
    pub fn legend_entries(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .map(|k| (k.to_string(), self.hex_for(k)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Seed colour table (SpotNumber,Color)
// ---------------------------------------------------------------------------

/// Load a `SpotNumber,Color` table. Rows with unparseable colours are skipped.
pub fn load_seed_table(path: &Path) -> Result<BTreeMap<CategoryKey, Srgb<u8>>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening colour table {}", path.display()))?;
    let mut table = BTreeMap::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("colour table row {row_no}"))?;
        let (Some(key), Some(hex)) = (record.get(0), record.get(1)) else {
            continue;
        };
        match parse_hex(hex) {
            Some(color) => {
                table.insert(CategoryKey::new(key), color);
            }
            None => warn!("colour table row {row_no}: '{hex}' is not a hex colour"),
        }
    }
    Ok(table)
}

/// Write keys `1..=count` with unique random colours.
pub fn write_seed_table<R: Rng>(path: &Path, count: usize, rng: &mut R) -> Result<()> {
    let mut seen = BTreeSet::new();
    let mut colors = Vec::with_capacity(count);
    while colors.len() < count {
        let c: u32 = rng.gen_range(0..=0xFF_FFFF);
        if seen.insert(c) {
            colors.push(Srgb::new((c >> 16) as u8, (c >> 8) as u8, c as u8));
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating colour table {}", path.display()))?;
    writer.write_record(["SpotNumber", "Color"])?;
    for (i, color) in colors.into_iter().enumerate() {
        writer.write_record([(i + 1).to_string(), to_hex(color)])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> BTreeSet<CategoryKey> {
        (1..=n).map(|i| CategoryKey::new(i.to_string())).collect()
    }

    #[test]
    fn test_small_key_sets_use_fixed_palette_in_order() {
        let map = ColorMap::with_seed(Column::SpotNumber, &keys(3), None);
        let legend = map.legend_entries();
        assert_eq!(
            legend,
            vec![
                ("1".to_string(), "#FFD700".to_string()),
                ("2".to_string(), "#FF0000".to_string()),
                ("3".to_string(), "#00FFFF".to_string()),
            ]
        );
    }

    #[test]
    fn test_twelve_keys_get_twelve_distinct_colours() {
        let set = keys(12);
        let map = ColorMap::with_seed(Column::SpotNumber, &set, None);
        let colours: BTreeSet<String> = set.iter().map(|k| map.hex_for(k)).collect();
        assert_eq!(colours.len(), 12);
        assert_eq!(map.hex_for(&"12".into()), "#FF6347");
    }

    #[test]
    fn test_same_key_same_colour_across_lookups() {
        let set: BTreeSet<CategoryKey> = ["10", "2", "A"].iter().map(|s| CategoryKey::from(*s)).collect();
        let map = ColorMap::with_seed(Column::RowNumber, &set, None);
        let first = map.hex_for(&"10".into());
        let clone = map.clone();
        assert_eq!(clone.hex_for(&"10".into()), first);
        // sorted order is 2, 10, A
        assert_eq!(first, "#FF0000");
    }

    #[test]
    fn test_large_key_sets_are_vivid_and_deterministic() {
        let set = keys(20);
        let a = ColorMap::with_seed(Column::SpotNumber, &set, None);
        let b = ColorMap::with_seed(Column::SpotNumber, &set, None);
        assert_eq!(a.legend_entries(), b.legend_entries());

        let distinct: BTreeSet<String> = a.legend_entries().into_iter().map(|(_, c)| c).collect();
        assert_eq!(distinct.len(), 20);

        for key in &set {
            let c = a.color_for(key);
            let max = c.red.max(c.green).max(c.blue);
            // value 0.95 → brightest channel 242
            assert_eq!(max, 242);
        }
    }

    #[test]
    fn test_explicit_seed_changes_shuffle_only() {
        let set = keys(30);
        let a = ColorMap::with_seed(Column::SpotNumber, &set, Some(1));
        let b = ColorMap::with_seed(Column::SpotNumber, &set, Some(2));
        let ca: BTreeSet<String> = a.legend_entries().into_iter().map(|(_, c)| c).collect();
        let cb: BTreeSet<String> = b.legend_entries().into_iter().map(|(_, c)| c).collect();
        assert_eq!(ca, cb);
    }

    #[test]
    fn test_unmapped_key_uses_fallback_then_black() {
        let map = ColorMap::with_seed(Column::SpotNumber, &keys(2), None)
            .with_fallback(BTreeMap::from([(CategoryKey::from("40"), Srgb::new(1, 2, 3))]));
        assert_eq!(map.hex_for(&"40".into()), "#010203");
        assert_eq!(map.hex_for(&"41".into()), "#000000");
        // assigned keys win over the fallback table
        let map = ColorMap::with_seed(Column::SpotNumber, &keys(1), None)
            .with_fallback(BTreeMap::from([(CategoryKey::from("1"), Srgb::new(1, 2, 3))]));
        assert_eq!(map.hex_for(&"1".into()), "#FFD700");
    }

    #[test]
    fn test_hex_round_trip_through_parse() {
        assert_eq!(parse_hex("#ffd700"), Some(Srgb::new(0xFF, 0xD7, 0x00)));
        assert_eq!(parse_hex("not a colour"), None);
    }

    #[test]
    fn test_seed_table_written_and_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spotnumber_colors.csv");
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        write_seed_table(&path, 66, &mut rng).unwrap();

        let table = load_seed_table(&path).unwrap();
        assert_eq!(table.len(), 66);
        let distinct: BTreeSet<String> = table.values().map(|c| to_hex(*c)).collect();
        assert_eq!(distinct.len(), 66);
        assert!(table.contains_key(&CategoryKey::from("66")));
    }
}
