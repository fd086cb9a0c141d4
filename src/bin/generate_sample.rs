use std::sync::Arc;

use arrow::array::{BinaryBuilder, Float32Builder, Int64Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const NUM_WAVELENGTH_BINS: usize = 32;
const NUM_TIME_BINS: usize = 180;
const WAVELENGTH_MIN: f64 = 3000.0;
const WAVELENGTH_MAX: f64 = 10100.0;
const TIME_START: f64 = -50.0;
const TIME_END: f64 = 130.0;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// One synthetic transient: a Gaussian bump in time whose spectral peak
/// depends on the class, encoded as the interleaved flux / flux-error
/// payload.
fn generate_payload(label: i64, amplitude: f64, rng: &mut SimpleRng) -> Vec<u8> {
    let wavelengths = linspace(WAVELENGTH_MIN, WAVELENGTH_MAX, NUM_WAVELENGTH_BINS);
    let times = linspace(TIME_START, TIME_END, NUM_TIME_BINS);

    // SNIa-like events peak bluer and decline faster.
    let (spectral_mu, decline_sigma) = if label == 1 {
        (4500.0, 18.0)
    } else {
        (6500.0, 35.0)
    };

    let mut bytes = Vec::with_capacity(NUM_WAVELENGTH_BINS * NUM_TIME_BINS * 16);
    for &wl in &wavelengths {
        let spectral_weight = gaussian(wl, spectral_mu, 1500.0, 1.0);
        for &t in &times {
            let signal = amplitude * spectral_weight * gaussian(t, 0.0, decline_sigma, 1.0);
            let noise = rng.gauss(0.0, 0.02 * amplitude);
            let flux = signal + noise;
            // Sparse sampling: ~40% of bins observed, the rest left empty.
            let (flux, flux_err) = if rng.next_f64() < 0.4 {
                (flux, 0.02 * amplitude + 0.05 * signal.abs())
            } else {
                (0.0, 0.0)
            };
            bytes.extend_from_slice(&flux.to_le_bytes());
            bytes.extend_from_slice(&flux_err.to_le_bytes());
        }
    }
    bytes
}

fn main() {
    let mut rng = SimpleRng::new(42);
    let num_events = 200;

    let mut id_builder = Int64Builder::new();
    let mut label_builder = Int64Builder::new();
    let mut z_builder = Float32Builder::new();
    let mut z_err_builder = Float32Builder::new();
    let mut image_builder = BinaryBuilder::new();

    for i in 0..num_events {
        let label = (i % 2) as i64;
        let amplitude = 50.0 + 150.0 * rng.next_f64();
        let z = 0.05 + 0.6 * rng.next_f64();

        id_builder.append_value(1000 + i as i64);
        label_builder.append_value(label);
        z_builder.append_value(z as f32);
        z_err_builder.append_value((0.01 + 0.02 * rng.next_f64()) as f32);
        image_builder.append_value(generate_payload(label, amplitude, &mut rng));
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Int64, false),
        Field::new("z", DataType::Float32, false),
        Field::new("z_err", DataType::Float32, false),
        Field::new("image_raw", DataType::Binary, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(id_builder.finish()),
            Arc::new(label_builder.finish()),
            Arc::new(z_builder.finish()),
            Arc::new(z_err_builder.finish()),
            Arc::new(image_builder.finish()),
        ],
    )
    .expect("Failed to create RecordBatch");

    let output_path = "sample_records.parquet";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {num_events} events ({NUM_WAVELENGTH_BINS}x{NUM_TIME_BINS} heatmaps) to {output_path}"
    );
}
