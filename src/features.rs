use std::ops::Range;

use crate::config::{BLUE_BAND, PEAK_WINDOW_END, PEAK_WINDOW_START, RED_BAND};
use crate::data::model::{Grid, Record};

// ---------------------------------------------------------------------------
// FeatureRow – the fixed summary schema, one row per record
// ---------------------------------------------------------------------------

/// Derived scalar features for one record. Fields that can be genuinely
/// uncomputable (empty half-max bracket, empty colour band, zero red flux)
/// are `Option<f64>`: `None` means "undefined", which downstream population
/// statistics treat differently from zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    // Metadata
    pub snid: i64,
    pub label: i64,
    pub label_name: &'static str,
    pub redshift: f32,
    pub redshift_err: f32,

    // Whole-grid flux statistics
    pub total_flux: f64,
    pub max_flux: f64,
    pub mean_flux: f64,
    pub median_flux: f64,
    pub std_flux: f64,

    // Peak cell
    pub peak_flux_wavelength_idx: usize,
    pub peak_flux_time_idx: usize,
    pub peak_flux_wavelength: f64,
    pub peak_flux_time: f64,

    // Light curve (flux summed over wavelength)
    pub lc_max: f64,
    pub lc_mean: f64,
    pub lc_peak_time_idx: usize,
    pub lc_peak_time: f64,
    pub flux_before_peak: f64,
    pub flux_after_peak: f64,

    // Half-max light-curve shape
    pub rise_time_days: Option<f64>,
    pub decline_time_days: Option<f64>,
    pub duration_days: Option<f64>,

    // Peak-phase spectrum
    pub spectrum_max: f64,
    pub spectrum_mean: f64,
    pub spectrum_peak_wavelength_idx: usize,
    pub spectrum_peak_wavelength: f64,

    // Colour
    pub blue_flux: Option<f64>,
    pub red_flux: Option<f64>,
    pub color_ratio: Option<f64>,

    // Signal-to-noise
    pub snr_mean: f64,
    pub snr_median: f64,
    pub snr_max: f64,
    pub snr_peak: f64,

    // Coverage
    pub num_nonzero_bins: usize,
    pub coverage_fraction: f64,
    pub num_epochs_with_data: usize,
    pub temporal_coverage_fraction: f64,
    pub num_wavelengths_with_data: usize,
    pub spectral_coverage_fraction: f64,
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// Reduce one decoded record to its feature row. Pure: depends only on the
/// record and the shared axes, never on other records or prior calls.
pub fn extract_features(record: &Record, wavelengths: &[f64], times: &[f64]) -> FeatureRow {
    let flux = &record.flux;
    let flux_err = &record.flux_err;
    debug_assert_eq!(flux.wavelength_bins(), wavelengths.len());
    debug_assert_eq!(flux.time_bins(), times.len());

    let values = flux.values();
    let mean_flux = mean(values);
    let (peak_w, peak_t) = flux.argmax();

    // Light curve and its peak.
    let lc = light_curve(flux);
    let lc_max = nan_max(&lc);
    let lc_peak_idx = argmax(&lc);
    let flux_before_peak = lc[..lc_peak_idx].iter().sum();
    let flux_after_peak = lc[lc_peak_idx..].iter().sum();

    // Rise / decline / duration from the strictly-above-half-max bracket.
    // The bracket is empty for an all-zero (or all-negative) light curve, in
    // which case all three stay undefined.
    let half_max = lc_max / 2.0;
    let first_above = lc.iter().position(|&v| v > half_max);
    let last_above = lc.iter().rposition(|&v| v > half_max);
    let (rise_time_days, decline_time_days, duration_days) = match (first_above, last_above) {
        (Some(first), Some(last)) => (
            Some(times[lc_peak_idx] - times[first]),
            Some(times[last] - times[lc_peak_idx]),
            Some(times[last] - times[first]),
        ),
        _ => (None, None, None),
    };

    // Peak-phase spectrum. A degenerate (empty) window is not guarded: the
    // per-wavelength averages come out NaN (0/0) and flow through unchanged.
    let window = peak_window(times);
    let spectrum = peak_phase_spectrum(flux, &window);
    let spectrum_peak_idx = argmax(&spectrum);

    // Colour bands over the wavelength axis (inclusive bounds).
    let blue: Vec<usize> = band_indices(wavelengths, BLUE_BAND);
    let red: Vec<usize> = band_indices(wavelengths, RED_BAND);
    let (blue_flux, red_flux, color_ratio) = if blue.is_empty() || red.is_empty() {
        (None, None, None)
    } else {
        let b = band_flux(flux, &lc, &blue);
        let r = band_flux(flux, &lc, &red);
        let ratio = if r > 0.0 { Some(b / r) } else { None };
        (Some(b), Some(r), ratio)
    };

    // Per-bin SNR: 0 where no error estimate exists. Mean/median are over the
    // strictly positive entries only and fall back to 0 (not undefined).
    let snr: Vec<f64> = values
        .iter()
        .zip(flux_err.values())
        .map(|(&f, &e)| if e > 0.0 { f / e } else { 0.0 })
        .collect();
    let positive_snr: Vec<f64> = snr.iter().copied().filter(|&v| v > 0.0).collect();
    let (snr_mean, snr_median) = if positive_snr.is_empty() {
        (0.0, 0.0)
    } else {
        (mean(&positive_snr), median(&positive_snr))
    };

    // Coverage.
    let num_nonzero_bins = values.iter().filter(|&&v| v > 0.0).count();
    let num_epochs_with_data = (0..flux.time_bins())
        .filter(|&t| (0..flux.wavelength_bins()).any(|w| flux.get(w, t) > 0.0))
        .count();
    let num_wavelengths_with_data = (0..flux.wavelength_bins())
        .filter(|&w| (0..flux.time_bins()).any(|t| flux.get(w, t) > 0.0))
        .count();

    FeatureRow {
        snid: record.id,
        label: record.label,
        label_name: record.label_name(),
        redshift: record.redshift,
        redshift_err: record.redshift_err,

        total_flux: values.iter().sum(),
        max_flux: nan_max(values),
        mean_flux,
        median_flux: median(values),
        std_flux: population_std(values, mean_flux),

        peak_flux_wavelength_idx: peak_w,
        peak_flux_time_idx: peak_t,
        peak_flux_wavelength: wavelengths[peak_w],
        peak_flux_time: times[peak_t],

        lc_max,
        lc_mean: mean(&lc),
        lc_peak_time_idx: lc_peak_idx,
        lc_peak_time: times[lc_peak_idx],
        flux_before_peak,
        flux_after_peak,

        rise_time_days,
        decline_time_days,
        duration_days,

        spectrum_max: nan_max(&spectrum),
        spectrum_mean: mean(&spectrum),
        spectrum_peak_wavelength_idx: spectrum_peak_idx,
        spectrum_peak_wavelength: wavelengths[spectrum_peak_idx],

        blue_flux,
        red_flux,
        color_ratio,

        snr_mean,
        snr_median,
        snr_max: nan_max(&snr),
        snr_peak: snr[peak_w * flux.time_bins() + peak_t],

        num_nonzero_bins,
        coverage_fraction: num_nonzero_bins as f64 / values.len() as f64,
        num_epochs_with_data,
        temporal_coverage_fraction: num_epochs_with_data as f64 / flux.time_bins() as f64,
        num_wavelengths_with_data,
        spectral_coverage_fraction: num_wavelengths_with_data as f64 / flux.wavelength_bins() as f64,
    }
}

// ---------------------------------------------------------------------------
// Shared derivations (also used by the projection extractors)
// ---------------------------------------------------------------------------

/// Wavelength-integrated flux per time bin.
pub fn light_curve(flux: &Grid) -> Vec<f64> {
    (0..flux.time_bins())
        .map(|t| (0..flux.wavelength_bins()).map(|w| flux.get(w, t)).sum())
        .collect()
}

/// Quadrature-summed flux error per time bin (independent errors).
pub fn light_curve_err(flux_err: &Grid) -> Vec<f64> {
    (0..flux_err.time_bins())
        .map(|t| {
            (0..flux_err.wavelength_bins())
                .map(|w| flux_err.get(w, t).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect()
}

/// Time-bin window around the inferred peak, found by nearest-coordinate
/// match against the configured `[-10, +20)` day window.
pub fn peak_window(times: &[f64]) -> Range<usize> {
    nearest_index(times, PEAK_WINDOW_START)..nearest_index(times, PEAK_WINDOW_END)
}

/// Per-wavelength flux averaged over the peak window.
pub fn peak_phase_spectrum(flux: &Grid, window: &Range<usize>) -> Vec<f64> {
    let n = window.len() as f64;
    (0..flux.wavelength_bins())
        .map(|w| window.clone().map(|t| flux.get(w, t)).sum::<f64>() / n)
        .collect()
}

/// Per-wavelength RMS flux error over the peak window.
pub fn peak_phase_spectrum_err(flux_err: &Grid, window: &Range<usize>) -> Vec<f64> {
    let n = window.len() as f64;
    (0..flux_err.wavelength_bins())
        .map(|w| {
            (window.clone().map(|t| flux_err.get(w, t).powi(2)).sum::<f64>() / n).sqrt()
        })
        .collect()
}

fn band_indices(wavelengths: &[f64], band: (f64, f64)) -> Vec<usize> {
    wavelengths
        .iter()
        .enumerate()
        .filter(|(_, &wl)| wl >= band.0 && wl <= band.1)
        .map(|(i, _)| i)
        .collect()
}

/// Light curve dotted with the band-restricted light curve.
fn band_flux(flux: &Grid, lc: &[f64], band: &[usize]) -> f64 {
    (0..flux.time_bins())
        .map(|t| lc[t] * band.iter().map(|&w| flux.get(w, t)).sum::<f64>())
        .sum()
}

// ---------------------------------------------------------------------------
// Scalar helpers
// ---------------------------------------------------------------------------

/// Index of the first nearest value to `target`.
pub fn nearest_index(axis: &[f64], target: f64) -> usize {
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (i, &v) in axis.iter().enumerate() {
        let d = (v - target).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Index of the first maximum.
fn argmax(xs: &[f64]) -> usize {
    let mut best = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in xs.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Maximum with NaN propagation.
fn nan_max(xs: &[f64]) -> f64 {
    xs.iter().fold(f64::NEG_INFINITY, |m, &v| {
        if m.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            m.max(v)
        }
    })
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Median; an even count averages the middle pair.
fn median(xs: &[f64]) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Population standard deviation (divisor n).
fn population_std(xs: &[f64], mean: f64) -> f64 {
    (xs.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::linspace;

    fn make_record(flux: Grid, flux_err: Grid) -> Record {
        Record {
            id: 1,
            label: 1,
            redshift: 0.1,
            redshift_err: 0.01,
            flux,
            flux_err,
        }
    }

    fn small_axes() -> (Vec<f64>, Vec<f64>) {
        // 4 wavelengths spanning both colour bands, 5 time bins around peak.
        (linspace(3000.0, 10000.0, 4), linspace(-50.0, 130.0, 5))
    }

    #[test]
    fn single_nonzero_cell_scenario() {
        let (wl, times) = small_axes();
        let mut flux = Grid::zeros(4, 5);
        flux.set(2, 3, 10.0);
        let rec = make_record(flux, Grid::zeros(4, 5));

        let row = extract_features(&rec, &wl, &times);

        assert_eq!(row.peak_flux_wavelength_idx, 2);
        assert_eq!(row.peak_flux_time_idx, 3);
        assert_eq!(row.lc_peak_time_idx, 3);
        assert_eq!(row.lc_max, 10.0);
        assert_eq!(row.coverage_fraction, 1.0 / 20.0);
        assert_eq!(row.num_nonzero_bins, 1);

        // flux_err is all zero, so no SNR entry is positive.
        assert_eq!(row.snr_mean, 0.0);
        assert_eq!(row.snr_median, 0.0);
        assert_eq!(row.snr_max, 0.0);
        assert_eq!(row.snr_peak, 0.0);

        // Single-bin half-max crossing: all shape times are zero, not None.
        assert_eq!(row.rise_time_days, Some(0.0));
        assert_eq!(row.decline_time_days, Some(0.0));
        assert_eq!(row.duration_days, Some(0.0));
    }

    #[test]
    fn all_zero_flux_yields_undefined_shape_and_zero_snr() {
        let (wl, times) = small_axes();
        let rec = make_record(Grid::zeros(4, 5), Grid::zeros(4, 5));
        let row = extract_features(&rec, &wl, &times);

        assert_eq!(row.coverage_fraction, 0.0);
        assert_eq!(row.temporal_coverage_fraction, 0.0);
        assert_eq!(row.spectral_coverage_fraction, 0.0);
        assert_eq!(row.snr_mean, 0.0);
        assert_eq!(row.snr_median, 0.0);
        assert_eq!(row.rise_time_days, None);
        assert_eq!(row.decline_time_days, None);
        assert_eq!(row.duration_days, None);
    }

    #[test]
    fn peak_partition_property() {
        let (wl, times) = small_axes();
        let mut flux = Grid::zeros(4, 5);
        for w in 0..4 {
            for t in 0..5 {
                flux.set(w, t, (w + 1) as f64 * 0.5 + t as f64);
            }
        }
        let rec = make_record(flux, Grid::zeros(4, 5));
        let row = extract_features(&rec, &wl, &times);

        let lc_total: f64 = light_curve(&rec.flux).iter().sum();
        assert!((row.flux_before_peak + row.flux_after_peak - lc_total).abs() < 1e-9);
    }

    #[test]
    fn coverage_fractions_are_bounded() {
        let (wl, times) = small_axes();
        let mut flux = Grid::zeros(4, 5);
        flux.set(0, 0, 1.0);
        flux.set(3, 4, 2.0);
        flux.set(1, 2, -1.0); // negative flux does not count as coverage
        let rec = make_record(flux, Grid::zeros(4, 5));
        let row = extract_features(&rec, &wl, &times);

        for frac in [
            row.coverage_fraction,
            row.temporal_coverage_fraction,
            row.spectral_coverage_fraction,
        ] {
            assert!((0.0..=1.0).contains(&frac));
        }
        assert_eq!(row.num_nonzero_bins, 2);
        assert_eq!(row.num_epochs_with_data, 2);
        assert_eq!(row.num_wavelengths_with_data, 2);
    }

    #[test]
    fn snr_statistics_exclude_zero_entries() {
        let (wl, times) = small_axes();
        let mut flux = Grid::zeros(4, 5);
        let mut flux_err = Grid::zeros(4, 5);
        flux.set(0, 0, 10.0);
        flux_err.set(0, 0, 2.0); // snr 5
        flux.set(1, 1, 12.0);
        flux_err.set(1, 1, 4.0); // snr 3
        flux.set(2, 2, 100.0); // no error estimate -> snr 0, excluded
        let rec = make_record(flux, flux_err);
        let row = extract_features(&rec, &wl, &times);

        assert_eq!(row.snr_mean, 4.0);
        assert_eq!(row.snr_median, 4.0);
        assert_eq!(row.snr_max, 5.0);
        // Overall flux peak is the error-free cell, so snr_peak is 0.
        assert_eq!(row.peak_flux_wavelength_idx, 2);
        assert_eq!(row.snr_peak, 0.0);
    }

    #[test]
    fn color_bands_disjoint_from_axis_are_undefined() {
        let times = linspace(-50.0, 130.0, 5);
        let wl = linspace(20000.0, 30000.0, 4);
        let mut flux = Grid::zeros(4, 5);
        flux.set(0, 0, 5.0);
        let rec = make_record(flux, Grid::zeros(4, 5));
        let row = extract_features(&rec, &wl, &times);

        assert_eq!(row.blue_flux, None);
        assert_eq!(row.red_flux, None);
        assert_eq!(row.color_ratio, None);
    }

    #[test]
    fn zero_red_flux_makes_ratio_undefined_but_keeps_band_totals() {
        let (wl, times) = small_axes();
        // Flux only in the blue band (wavelength index 0 = 3000 A).
        let mut flux = Grid::zeros(4, 5);
        flux.set(0, 2, 4.0);
        let rec = make_record(flux, Grid::zeros(4, 5));
        let row = extract_features(&rec, &wl, &times);

        assert_eq!(row.blue_flux, Some(16.0)); // lc[2] = 4, blue band lc[2] = 4
        assert_eq!(row.red_flux, Some(0.0));
        assert_eq!(row.color_ratio, None);
    }

    #[test]
    fn reducer_is_idempotent() {
        let (wl, times) = small_axes();
        let mut flux = Grid::zeros(4, 5);
        let mut flux_err = Grid::zeros(4, 5);
        for w in 0..4 {
            for t in 0..5 {
                flux.set(w, t, ((w * 5 + t) % 7) as f64 - 2.0);
                flux_err.set(w, t, 0.25 * t as f64);
            }
        }
        let rec = make_record(flux, flux_err);
        let first = extract_features(&rec, &wl, &times);
        let second = extract_features(&rec, &wl, &times);
        assert_eq!(first, second);
    }

    #[test]
    fn median_averages_middle_pair_for_even_counts() {
        assert_eq!(median(&[1.0, 3.0, 2.0, 10.0]), 2.5);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn nearest_index_prefers_first_match() {
        let axis = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(nearest_index(&axis, 1.4), 1);
        assert_eq!(nearest_index(&axis, 1.5), 1); // tie resolves to first
        assert_eq!(nearest_index(&axis, -100.0), 0);
    }

    #[test]
    fn peak_window_matches_nearest_coordinates() {
        let times = linspace(-50.0, 130.0, 180);
        let window = peak_window(&times);
        assert!((times[window.start] - (-10.0)).abs() <= 0.51);
        assert!((times[window.end] - 20.0).abs() <= 0.51);
        assert!(window.start < window.end);
    }

    #[test]
    fn light_curve_err_is_quadrature_sum() {
        let mut flux_err = Grid::zeros(2, 3);
        flux_err.set(0, 1, 3.0);
        flux_err.set(1, 1, 4.0);
        let errs = light_curve_err(&flux_err);
        assert_eq!(errs, vec![0.0, 5.0, 0.0]);
    }
}
