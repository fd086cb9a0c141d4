use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Heatmap geometry (fixed at build time; every record shares these axes)
// ---------------------------------------------------------------------------

/// Number of wavelength bins per heatmap.
pub const NUM_WAVELENGTH_BINS: usize = 32;
/// Number of time bins per heatmap.
pub const NUM_TIME_BINS: usize = 180;

/// Wavelength range covered by the bins, in Angstroms (inclusive).
pub const WAVELENGTH_MIN: f64 = 3000.0;
pub const WAVELENGTH_MAX: f64 = 10100.0;

/// Time range covered by the bins, in days relative to the inferred peak
/// (inclusive).
pub const TIME_START: f64 = -50.0;
pub const TIME_END: f64 = 130.0;

/// Peak-phase averaging window for the spectrum, in days.
pub const PEAK_WINDOW_START: f64 = -10.0;
pub const PEAK_WINDOW_END: f64 = 20.0;

/// Blue / red wavelength bands for the colour ratio, in Angstroms (inclusive).
pub const BLUE_BAND: (f64, f64) = (3000.0, 5000.0);
pub const RED_BAND: (f64, f64) = (6000.0, 10000.0);

/// Expected payload size of one serialized heatmap: two f64 channels.
pub const PAYLOAD_BYTES: usize = NUM_WAVELENGTH_BINS * NUM_TIME_BINS * 2 * 8;

// ---------------------------------------------------------------------------
// Shared coordinate axes
// ---------------------------------------------------------------------------

/// `n` evenly spaced values over `[start, stop]` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Wavelength bin centers in Angstroms. Computed once, identical for every
/// record.
pub fn wavelength_axis() -> &'static [f64] {
    static AXIS: OnceLock<Vec<f64>> = OnceLock::new();
    AXIS.get_or_init(|| linspace(WAVELENGTH_MIN, WAVELENGTH_MAX, NUM_WAVELENGTH_BINS))
}

/// Time bin centers in days relative to peak. Computed once, identical for
/// every record.
pub fn time_axis() -> &'static [f64] {
    static AXIS: OnceLock<Vec<f64>> = OnceLock::new();
    AXIS.get_or_init(|| linspace(TIME_START, TIME_END, NUM_TIME_BINS))
}
