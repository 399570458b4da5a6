//! Writes a small synthetic data directory for trying out the reports:
//!
//! - `data/source_data/printing_raw_data_report_vas_000NN.csv` per run
//! - `data/processed/cassette_table.csv`
//! - `data/views/view_case_01.parquet`

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const RUNS: [u32; 3] = [12, 13, 14];
const ROWS: u32 = 4;
const SPOTS: u32 = 6;
const DOTS_PER_SPOT: u32 = 10;
const CASSETTES: u32 = 2;
/// Share of dots reported with the 999 "not measured" marker.
const MISSING_RATE: f64 = 0.02;

/// Box-Muller transform for a normal sample.
fn gauss<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn barcode(run: u32, row: u32) -> String {
    format!("SUB{run:03}{row:02}")
}

struct Dot {
    run: u32,
    row: u32,
    spot: u32,
    x: f64,
    y: f64,
}

fn generate_dots(rng: &mut ChaCha8Rng) -> Vec<Dot> {
    let mut dots = Vec::new();
    for &run in &RUNS {
        // each run drifts a little and gets noisier
        let drift = gauss(rng, 0.0, 0.01);
        let sigma = 0.01 + 0.005 * f64::from(run - RUNS[0]);
        for row in 1..=ROWS {
            for spot in 1..=SPOTS {
                for _ in 0..DOTS_PER_SPOT {
                    let (x, y) = if rng.gen_bool(MISSING_RATE) {
                        (999.0, 999.0)
                    } else {
                        (gauss(rng, drift, sigma), gauss(rng, -drift, sigma))
                    };
                    dots.push(Dot {
                        run,
                        row,
                        spot,
                        x,
                        y,
                    });
                }
            }
        }
    }
    dots
}

fn write_printing_reports(dir: &Path, dots: &[Dot]) -> Result<()> {
    for &run in &RUNS {
        let path = dir.join(format!("printing_raw_data_report_vas_{run:05}.csv"));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(["RowNumber", "SpotNumber", "XOffset", "YOffset", "TaskName2"])?;
        for dot in dots.iter().filter(|d| d.run == run) {
            writer.write_record([
                dot.row.to_string(),
                dot.spot.to_string(),
                format!("{:.5}", dot.x),
                format!("{:.5}", dot.y),
                barcode(run, dot.row),
            ])?;
        }
        writer.flush()?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn write_cassette_table(dir: &Path) -> Result<()> {
    let path = dir.join("cassette_table.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "cassette_number",
        "cassette_code",
        "substrate_barcode",
        "pallette_number",
        "run",
    ])?;
    for &run in &RUNS {
        for row in 1..=ROWS {
            let cassette = (row - 1) % CASSETTES + 1;
            writer.write_record([
                cassette.to_string(),
                format!("CAS-{run}-{cassette}"),
                barcode(run, row),
                ((row + 1) / 2).to_string(),
                run.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_case_01_parquet(dir: &Path, dots: &[Dot]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("run_id", DataType::Utf8, false),
        Field::new("SpotNumber", DataType::Utf8, false),
        Field::new("XOffset", DataType::Float64, false),
        Field::new("YOffset", DataType::Float64, false),
    ]));

    let run_ids: Vec<String> = dots.iter().map(|d| d.run.to_string()).collect();
    let spots: Vec<String> = dots.iter().map(|d| d.spot.to_string()).collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(run_ids)),
            Arc::new(StringArray::from_iter_values(spots)),
            Arc::new(Float64Array::from_iter_values(dots.iter().map(|d| d.x))),
            Arc::new(Float64Array::from_iter_values(dots.iter().map(|d| d.y))),
        ],
    )?;

    let path = dir.join("view_case_01.parquet");
    let file = std::fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    println!("Wrote {} dots to {}", dots.len(), path.display());
    Ok(())
}

fn main() -> Result<()> {
    let root = Path::new("data");
    let source = root.join("source_data");
    let processed = root.join("processed");
    let views = root.join("views");
    for dir in [&source, &processed, &views] {
        std::fs::create_dir_all(dir)?;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let dots = generate_dots(&mut rng);

    write_printing_reports(&source, &dots)?;
    write_cassette_table(&processed)?;
    write_case_01_parquet(&views, &dots)?;
    Ok(())
}
