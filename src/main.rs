mod batch;
mod config;
mod data;
mod features;
mod output;
mod projections;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};

use batch::{run_batch, BatchOptions};

/// Extract per-event summary features from serialized heatmap records.
#[derive(Debug, Parser)]
#[command(name = "heatmap-extract", version)]
struct Args {
    /// Input record file (.parquet or .json)
    #[arg(long)]
    input: PathBuf,

    /// Output summary CSV path
    #[arg(long)]
    output: PathBuf,

    /// Also save full light curves to <output>_lightcurves.csv
    #[arg(long)]
    full_lightcurves: bool,

    /// Also save peak spectra to <output>_spectra.csv
    #[arg(long)]
    full_spectra: bool,

    /// Limit number of events to process (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        })
        .init();

    if !args.input.exists() {
        bail!("record file not found: {}", args.input.display());
    }
    if let Some(dir) = args.output.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating output directory {}", dir.display()))?;
        }
    }

    info!("processing: {}", args.input.display());
    info!("output: {}", args.output.display());

    let source = data::source::open(&args.input)?;
    let options = BatchOptions {
        limit: args.limit,
        full_lightcurves: args.full_lightcurves,
        full_spectra: args.full_spectra,
    };
    let result = run_batch(source, &options)?;

    output::write_summary(&args.output, &result.summary)?;
    info!("saved summary to: {}", args.output.display());

    if let Some(rows) = &result.lightcurves {
        let path = output::sibling_path(&args.output, "_lightcurves");
        output::write_lightcurves(&path, rows)?;
        info!("saved light curves to: {}", path.display());
    }
    if let Some(rows) = &result.spectra {
        let path = output::sibling_path(&args.output, "_spectra");
        output::write_spectra(&path, rows)?;
        info!("saved spectra to: {}", path.display());
    }

    // Quick run summary.
    let total = result.summary.len();
    let n_ia = result.summary.iter().filter(|r| r.label == 1).count();
    info!("total events: {total}");
    info!("SNIa: {n_ia}, Non-Ia: {}", total - n_ia);
    if total > 0 {
        let z_min = result
            .summary
            .iter()
            .map(|r| r.redshift)
            .fold(f32::INFINITY, f32::min);
        let z_max = result
            .summary
            .iter()
            .map(|r| r.redshift)
            .fold(f32::NEG_INFINITY, f32::max);
        let mean_snr =
            result.summary.iter().map(|r| r.snr_mean).sum::<f64>() / total as f64;
        info!("redshift range: {z_min:.3} - {z_max:.3}");
        info!("mean SNR: {mean_snr:.2}");
    }

    Ok(())
}
