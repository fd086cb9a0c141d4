use anyhow::{Context, Result};
use log::info;

use crate::config::{time_axis, wavelength_axis};
use crate::data::model::Record;
use crate::features::{extract_features, FeatureRow};
use crate::projections::{extract_light_curve, extract_spectrum, LightCurveRow, SpectrumRow};

/// What to compute per record beyond the summary row.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Stop after this many records.
    pub limit: Option<usize>,
    pub full_lightcurves: bool,
    pub full_spectra: bool,
}

/// Accumulated output tables, rows in source order.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub summary: Vec<FeatureRow>,
    pub lightcurves: Option<Vec<LightCurveRow>>,
    pub spectra: Option<Vec<SpectrumRow>>,
}

impl BatchOutput {
    pub fn len(&self) -> usize {
        self.summary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }
}

/// Drive the extraction over a record source.
///
/// Records are pulled one at a time; a malformed record stops the batch with
/// an error naming it (no partial row is emitted for it). Numerical
/// degeneracies inside the reducer never stop the batch.
pub fn run_batch(
    source: impl Iterator<Item = Result<Record>>,
    options: &BatchOptions,
) -> Result<BatchOutput> {
    let wavelengths = wavelength_axis();
    let times = time_axis();

    let mut output = BatchOutput {
        summary: Vec::new(),
        lightcurves: options.full_lightcurves.then(Vec::new),
        spectra: options.full_spectra.then(Vec::new),
    };

    let limit = options.limit.unwrap_or(usize::MAX);
    for (count, record) in source.take(limit).enumerate() {
        let record = record.with_context(|| format!("record {count} failed to decode"))?;

        output
            .summary
            .push(extract_features(&record, wavelengths, times));
        if let Some(rows) = &mut output.lightcurves {
            rows.push(extract_light_curve(&record, times));
        }
        if let Some(rows) = &mut output.spectra {
            rows.push(extract_spectrum(&record, wavelengths, times));
        }

        if (count + 1) % 1000 == 0 {
            info!("processed {} events...", count + 1);
        }
    }

    info!("total events processed: {}", output.len());
    Ok(output)
}
