use thiserror::Error;

// ---------------------------------------------------------------------------
// DecodeError – everything that makes a record unusable
// ---------------------------------------------------------------------------

/// A malformed record. Any of these aborts the batch; numerical degeneracies
/// downstream never produce one.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is {actual} bytes, expected {expected} for a {wavelength_bins}x{time_bins}x2 grid")]
    PayloadLength {
        actual: usize,
        expected: usize,
        wavelength_bins: usize,
        time_bins: usize,
    },

    #[error("record {row}: missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },

    #[error("record {row}: field '{field}' is null")]
    NullField { row: usize, field: &'static str },

    #[error("record {row}: field '{field}' has unexpected type {found}")]
    FieldType {
        row: usize,
        field: &'static str,
        found: String,
    },

    #[error("record {row}: '{field}' is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    GridShape {
        row: usize,
        field: &'static str,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
}

// ---------------------------------------------------------------------------
// Grid – one wavelength x time matrix
// ---------------------------------------------------------------------------

/// A dense wavelength-major matrix of f64 values. The shape travels with the
/// data so the reducer and its tests can work on small grids.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    wavelength_bins: usize,
    time_bins: usize,
    values: Vec<f64>,
}

impl Grid {
    /// Build a grid from wavelength-major values; `values.len()` must equal
    /// `wavelength_bins * time_bins`.
    pub fn new(wavelength_bins: usize, time_bins: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), wavelength_bins * time_bins);
        Grid {
            wavelength_bins,
            time_bins,
            values,
        }
    }

    pub fn zeros(wavelength_bins: usize, time_bins: usize) -> Self {
        Grid::new(
            wavelength_bins,
            time_bins,
            vec![0.0; wavelength_bins * time_bins],
        )
    }

    pub fn wavelength_bins(&self) -> usize {
        self.wavelength_bins
    }

    pub fn time_bins(&self) -> usize {
        self.time_bins
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, w: usize, t: usize) -> f64 {
        self.values[w * self.time_bins + t]
    }

    #[inline]
    pub fn set(&mut self, w: usize, t: usize, value: f64) {
        self.values[w * self.time_bins + t] = value;
    }

    /// All values in wavelength-major order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Position of the first maximum in wavelength-major order, as
    /// `(wavelength_idx, time_idx)`.
    pub fn argmax(&self) -> (usize, usize) {
        let mut best = 0usize;
        let mut best_val = f64::NEG_INFINITY;
        for (i, &v) in self.values.iter().enumerate() {
            if v > best_val {
                best_val = v;
                best = i;
            }
        }
        (best / self.time_bins, best % self.time_bins)
    }
}

// ---------------------------------------------------------------------------
// Heatmap – the two decoded channels of one record
// ---------------------------------------------------------------------------

/// The decoded flux / flux-uncertainty pair. `flux_err` entries are >= 0 by
/// construction; 0 means "no error estimate".
#[derive(Debug, Clone)]
pub struct Heatmap {
    pub flux: Grid,
    pub flux_err: Grid,
}

impl Heatmap {
    /// Decode a raw payload of little-endian f64 values laid out row-major as
    /// `(wavelength, time, channel)`, channel 0 = flux, channel 1 = flux
    /// error. The byte length must match the declared shape exactly.
    pub fn decode(
        bytes: &[u8],
        wavelength_bins: usize,
        time_bins: usize,
    ) -> Result<Heatmap, DecodeError> {
        let expected = wavelength_bins * time_bins * 2 * 8;
        if bytes.len() != expected {
            return Err(DecodeError::PayloadLength {
                actual: bytes.len(),
                expected,
                wavelength_bins,
                time_bins,
            });
        }

        let mut flux = Vec::with_capacity(wavelength_bins * time_bins);
        let mut flux_err = Vec::with_capacity(wavelength_bins * time_bins);
        for pair in bytes.chunks_exact(16) {
            flux.push(f64::from_le_bytes(pair[0..8].try_into().unwrap()));
            flux_err.push(f64::from_le_bytes(pair[8..16].try_into().unwrap()));
        }

        Ok(Heatmap {
            flux: Grid::new(wavelength_bins, time_bins, flux),
            flux_err: Grid::new(wavelength_bins, time_bins, flux_err),
        })
    }

    /// Inverse of [`Heatmap::decode`]; test harness only.
    #[cfg(test)]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.flux.len() * 16);
        for (f, e) in self.flux.values().iter().zip(self.flux_err.values()) {
            bytes.extend_from_slice(&f.to_le_bytes());
            bytes.extend_from_slice(&e.to_le_bytes());
        }
        bytes
    }
}

// ---------------------------------------------------------------------------
// Record – one decoded event
// ---------------------------------------------------------------------------

/// One decoded transient-event candidate. Immutable once built.
#[derive(Debug, Clone)]
pub struct Record {
    /// Dataset identifier (SNID).
    pub id: i64,
    /// Binary class tag: 1 = SNIa, 0 = contaminant.
    pub label: i64,
    /// Redshift and its uncertainty.
    pub redshift: f32,
    pub redshift_err: f32,
    pub flux: Grid,
    pub flux_err: Grid,
}

impl Record {
    pub fn label_name(&self) -> &'static str {
        if self.label == 1 {
            "SNIa"
        } else {
            "Non-Ia"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_heatmap() -> Heatmap {
        let mut flux = Grid::zeros(3, 4);
        let mut flux_err = Grid::zeros(3, 4);
        for w in 0..3 {
            for t in 0..4 {
                flux.set(w, t, (w * 10 + t) as f64);
                flux_err.set(w, t, 0.5 * (w + t) as f64);
            }
        }
        Heatmap { flux, flux_err }
    }

    #[test]
    fn decode_then_encode_is_identity() {
        let original = sample_heatmap();
        let bytes = original.encode();
        assert_eq!(bytes.len(), 3 * 4 * 2 * 8);

        let decoded = Heatmap::decode(&bytes, 3, 4).unwrap();
        assert_eq!(decoded.flux, original.flux);
        assert_eq!(decoded.flux_err, original.flux_err);
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn decode_deinterleaves_channels() {
        // Flux 2.0 and error 3.0 in the cell w=0, t=1.
        let mut bytes = vec![0u8; 2 * 2 * 2 * 8];
        let cell = 16; // (0 * time_bins + 1) * 16
        bytes[cell..cell + 8].copy_from_slice(&2.0f64.to_le_bytes());
        bytes[cell + 8..cell + 16].copy_from_slice(&3.0f64.to_le_bytes());

        let hm = Heatmap::decode(&bytes, 2, 2).unwrap();
        assert_eq!(hm.flux.get(0, 1), 2.0);
        assert_eq!(hm.flux_err.get(0, 1), 3.0);
        assert_eq!(hm.flux.get(0, 0), 0.0);
        assert_eq!(hm.flux_err.get(1, 1), 0.0);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let bytes = vec![0u8; 100];
        let err = Heatmap::decode(&bytes, 2, 2).unwrap_err();
        match err {
            DecodeError::PayloadLength {
                actual, expected, ..
            } => {
                assert_eq!(actual, 100);
                assert_eq!(expected, 64);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn argmax_returns_first_maximum() {
        let mut g = Grid::zeros(4, 5);
        g.set(2, 3, 10.0);
        assert_eq!(g.argmax(), (2, 3));

        // An all-equal grid resolves to the first cell.
        assert_eq!(Grid::zeros(4, 5).argmax(), (0, 0));
    }

    #[test]
    fn label_names() {
        let rec = Record {
            id: 7,
            label: 1,
            redshift: 0.1,
            redshift_err: 0.01,
            flux: Grid::zeros(1, 1),
            flux_err: Grid::zeros(1, 1),
        };
        assert_eq!(rec.label_name(), "SNIa");
        let rec = Record { label: 0, ..rec };
        assert_eq!(rec.label_name(), "Non-Ia");
    }
}
