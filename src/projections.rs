use crate::data::model::Record;
use crate::features::{light_curve, light_curve_err, peak_phase_spectrum, peak_phase_spectrum_err, peak_window};

// ---------------------------------------------------------------------------
// Full-resolution projections, one wide row per record
// ---------------------------------------------------------------------------

/// A sampled curve point: coordinate, flux, flux error.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePoint {
    pub coord: f64,
    pub flux: f64,
    pub flux_err: f64,
}

/// The wavelength-integrated light curve of one record, one point per time
/// bin.
#[derive(Debug, Clone, PartialEq)]
pub struct LightCurveRow {
    pub snid: i64,
    pub points: Vec<CurvePoint>,
}

/// The peak-phase spectrum of one record, one point per wavelength bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumRow {
    pub snid: i64,
    pub points: Vec<CurvePoint>,
}

/// Re-derive the full light curve with quadrature-summed errors. Independent
/// of the feature reducer by design; recomputation keeps the two decoupled.
pub fn extract_light_curve(record: &Record, times: &[f64]) -> LightCurveRow {
    let lc = light_curve(&record.flux);
    let lc_err = light_curve_err(&record.flux_err);
    let points = times
        .iter()
        .zip(lc)
        .zip(lc_err)
        .map(|((&coord, flux), flux_err)| CurvePoint {
            coord,
            flux,
            flux_err,
        })
        .collect();
    LightCurveRow {
        snid: record.id,
        points,
    }
}

/// Re-derive the peak-phase average spectrum with RMS errors.
pub fn extract_spectrum(record: &Record, wavelengths: &[f64], times: &[f64]) -> SpectrumRow {
    let window = peak_window(times);
    let spectrum = peak_phase_spectrum(&record.flux, &window);
    let spectrum_err = peak_phase_spectrum_err(&record.flux_err, &window);
    let points = wavelengths
        .iter()
        .zip(spectrum)
        .zip(spectrum_err)
        .map(|((&coord, flux), flux_err)| CurvePoint {
            coord,
            flux,
            flux_err,
        })
        .collect();
    SpectrumRow {
        snid: record.id,
        points,
    }
}
