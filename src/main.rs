mod color;
mod config;
mod data;
mod etl;
mod report;
mod state;
mod stats;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use palette::Srgb;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use config::Parameters;
use data::model::CategoryKey;
use report::case::{Layout, ReportCase, ALL_CASES};

const SEED_TABLE: &str = "spotnumber_colors.csv";
const SEED_TABLE_SIZE: usize = 66;

#[derive(Parser)]
#[command(name = "vas-report")]
#[command(about = "Dot-placement offset reports for printing runs", version)]
struct Cli {
    /// YAML parameters file (filters and report options)
    #[arg(short, long, global = true, default_value = "parameters.yaml")]
    config: PathBuf,

    /// Root of source_data/, processed/ and views/
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Where the HTML reports are written
    #[arg(long, global = true, default_value = "output/charts")]
    output_dir: PathBuf,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also append log lines to this file (stderr keeps logging)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Grid,
    Sequential,
    Both,
}

impl LayoutArg {
    fn layouts(self) -> Vec<Layout> {
        match self {
            LayoutArg::Grid => vec![Layout::Grid],
            LayoutArg::Sequential => vec![Layout::Sequential],
            LayoutArg::Both => vec![Layout::Sequential, Layout::Grid],
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Unify printing reports, scrape cassette templates and build the views
    Process,

    /// Render HTML chart reports from the views
    Charts {
        /// Only this case (1, 2, 3 or 01, 02, 03)
        #[arg(long)]
        case: Option<String>,
        #[arg(long, value_enum, default_value_t = LayoutArg::Both)]
        layout: LayoutArg,
    },

    /// `process` followed by `charts` for every case
    All,

    /// Write a seed colour table for spot numbers 1..=66
    Colors {
        /// Output CSV (defaults to <data-dir>/spotnumber_colors.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

/// Writes every log line to both sinks.
struct Tee<A, B>(A, B);

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write_all(buf)?;
        self.1.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder
        .filter_level(match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        });
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee(std::io::stderr(), file))));
    }
    builder.try_init()?;
    Ok(())
}

fn load_parameters(path: &Path) -> Result<Parameters> {
    if !path.exists() {
        warn!("{} not found, using default parameters", path.display());
        return Ok(Parameters::default());
    }
    let params = Parameters::from_yaml(path)?;
    info!("loaded parameters from {}", path.display());
    Ok(params)
}

/// Seed colour table from the data directory or the working directory.
fn load_seed_colors(data_dir: &Path) -> BTreeMap<CategoryKey, Srgb<u8>> {
    let candidates = [data_dir.join(SEED_TABLE), PathBuf::from(SEED_TABLE)];
    let Some(path) = candidates.iter().find(|p| p.exists()) else {
        return BTreeMap::new();
    };
    match color::load_seed_table(path) {
        Ok(table) => {
            info!("{} seed colours from {}", table.len(), path.display());
            table
        }
        Err(e) => {
            warn!("ignoring seed colour table: {e:#}");
            BTreeMap::new()
        }
    }
}

fn cmd_process(data_dir: &Path) -> Result<()> {
    let written = etl::run_all(data_dir)?;
    if written.is_empty() {
        warn!("no views written");
    }
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_charts(cli: &Cli, case: Option<&str>, layout: LayoutArg) -> Result<()> {
    let cases = match case {
        Some(id) => match ReportCase::by_id(id) {
            Some(case) => vec![case],
            None => bail!("unknown case '{id}'"),
        },
        None => ALL_CASES.to_vec(),
    };
    let params = load_parameters(&cli.config)?;
    let seed_colors = load_seed_colors(&cli.data_dir);
    let views_dir = cli.data_dir.join(etl::VIEWS_DIR);
    let layouts = layout.layouts();

    let mut failed = 0;
    for case in &cases {
        match report::generate_case(
            case,
            &views_dir,
            &cli.output_dir,
            &layouts,
            &params,
            &seed_colors,
        ) {
            Ok(paths) => {
                for path in paths {
                    println!("{}", path.display());
                }
            }
            Err(e) => {
                error!("case {}: {e:#}", case.id);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} cases failed", cases.len());
    }
    Ok(())
}

fn cmd_colors(data_dir: &Path, output: Option<PathBuf>, seed: u64) -> Result<()> {
    let path = output.unwrap_or_else(|| data_dir.join(SEED_TABLE));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    color::write_seed_table(&path, SEED_TABLE_SIZE, &mut rng)?;
    info!("seed colour table saved to {}", path.display());
    println!("{}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match &cli.command {
        Commands::Process => cmd_process(&cli.data_dir),
        Commands::Charts { case, layout } => cmd_charts(&cli, case.as_deref(), *layout),
        Commands::All => {
            cmd_process(&cli.data_dir)?;
            cmd_charts(&cli, None, LayoutArg::Both)
        }
        Commands::Colors { output, seed } => cmd_colors(&cli.data_dir, output.clone(), *seed),
    }
}
