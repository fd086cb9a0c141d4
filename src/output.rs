use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::features::FeatureRow;
use crate::projections::{LightCurveRow, SpectrumRow};

// ---------------------------------------------------------------------------
// CSV writers
// ---------------------------------------------------------------------------

/// Summary column order. Undefined (`None`) fields are written as empty
/// cells so downstream tooling can tell them apart from zero.
const SUMMARY_COLUMNS: &[&str] = &[
    "snid",
    "label",
    "label_name",
    "redshift",
    "redshift_err",
    "total_flux",
    "max_flux",
    "mean_flux",
    "median_flux",
    "std_flux",
    "peak_flux_wavelength_idx",
    "peak_flux_time_idx",
    "peak_flux_wavelength",
    "peak_flux_time",
    "lc_max",
    "lc_mean",
    "lc_peak_time_idx",
    "lc_peak_time",
    "flux_before_peak",
    "flux_after_peak",
    "rise_time_days",
    "decline_time_days",
    "duration_days",
    "spectrum_max",
    "spectrum_mean",
    "spectrum_peak_wavelength_idx",
    "spectrum_peak_wavelength",
    "blue_flux",
    "red_flux",
    "color_ratio",
    "snr_mean",
    "snr_median",
    "snr_max",
    "snr_peak",
    "num_nonzero_bins",
    "coverage_fraction",
    "num_epochs_with_data",
    "temporal_coverage_fraction",
    "num_wavelengths_with_data",
    "spectral_coverage_fraction",
];

fn fixed(v: f64) -> String {
    format!("{v:.3}")
}

fn opt(v: Option<f64>) -> String {
    v.map(fixed).unwrap_or_default()
}

/// Write the summary table: space-delimited, floats at three decimals.
pub fn write_summary(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer.write_record(SUMMARY_COLUMNS)?;
    for row in rows {
        writer.write_record(&[
            row.snid.to_string(),
            row.label.to_string(),
            row.label_name.to_string(),
            fixed(row.redshift as f64),
            fixed(row.redshift_err as f64),
            fixed(row.total_flux),
            fixed(row.max_flux),
            fixed(row.mean_flux),
            fixed(row.median_flux),
            fixed(row.std_flux),
            row.peak_flux_wavelength_idx.to_string(),
            row.peak_flux_time_idx.to_string(),
            fixed(row.peak_flux_wavelength),
            fixed(row.peak_flux_time),
            fixed(row.lc_max),
            fixed(row.lc_mean),
            row.lc_peak_time_idx.to_string(),
            fixed(row.lc_peak_time),
            fixed(row.flux_before_peak),
            fixed(row.flux_after_peak),
            opt(row.rise_time_days),
            opt(row.decline_time_days),
            opt(row.duration_days),
            fixed(row.spectrum_max),
            fixed(row.spectrum_mean),
            row.spectrum_peak_wavelength_idx.to_string(),
            fixed(row.spectrum_peak_wavelength),
            opt(row.blue_flux),
            opt(row.red_flux),
            opt(row.color_ratio),
            fixed(row.snr_mean),
            fixed(row.snr_median),
            fixed(row.snr_max),
            fixed(row.snr_peak),
            row.num_nonzero_bins.to_string(),
            fixed(row.coverage_fraction),
            row.num_epochs_with_data.to_string(),
            fixed(row.temporal_coverage_fraction),
            row.num_wavelengths_with_data.to_string(),
            fixed(row.spectral_coverage_fraction),
        ])?;
    }
    writer.flush().context("flushing summary CSV")?;
    Ok(())
}

/// Write the wide light-curve table: `snid` plus a
/// `time_i / flux_i / flux_err_i` triple per time bin.
pub fn write_lightcurves(path: &Path, rows: &[LightCurveRow]) -> Result<()> {
    write_wide(path, rows.iter().map(|r| (r.snid, &r.points)), "time", 3)
}

/// Write the wide spectrum table: `snid` plus a
/// `wavelength_i / flux_i / flux_err_i` triple per wavelength bin.
pub fn write_spectra(path: &Path, rows: &[SpectrumRow]) -> Result<()> {
    write_wide(
        path,
        rows.iter().map(|r| (r.snid, &r.points)),
        "wavelength",
        2,
    )
}

fn write_wide<'a>(
    path: &Path,
    rows: impl Iterator<Item = (i64, &'a Vec<crate::projections::CurvePoint>)>,
    coord_name: &str,
    index_width: usize,
) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let mut header_written = false;
    for (snid, points) in rows {
        if !header_written {
            let mut header = vec!["snid".to_string()];
            for i in 0..points.len() {
                header.push(format!("{coord_name}_{i:0index_width$}"));
                header.push(format!("flux_{i:0index_width$}"));
                header.push(format!("flux_err_{i:0index_width$}"));
            }
            writer.write_record(&header)?;
            header_written = true;
        }

        let mut record = vec![snid.to_string()];
        for p in points {
            record.push(p.coord.to_string());
            record.push(p.flux.to_string());
            record.push(p.flux_err.to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

/// Derive a sibling output path: `info.csv` + `_lightcurves` →
/// `info_lightcurves.csv`.
pub fn sibling_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = output.extension().and_then(|e| e.to_str()).unwrap_or("csv");
    output.with_file_name(format!("{stem}{suffix}.{ext}"))
}
