use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, BinaryArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeBinaryArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use serde::Deserialize;

use crate::config::{NUM_TIME_BINS, NUM_WAVELENGTH_BINS};

use super::model::{DecodeError, Grid, Heatmap, Record};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Open a record source. Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row per record, columns `label`, `image_raw`, `id`,
///   `z`, `z_err` (recommended; streamed batch by batch)
/// * `.json`    – `[{ "id": ..., "label": ..., "z": ..., "z_err": ...,
///   "flux": [[...]], "flux_err": [[...]] }, ...]` (small fixtures)
pub fn open(path: &Path) -> Result<Box<dyn Iterator<Item = Result<Record>>>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => Ok(Box::new(ParquetSource::open(path)?)),
        "json" => Ok(Box::new(load_json(path)?.into_iter().map(Ok))),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Parquet source
// ---------------------------------------------------------------------------

/// Lazy reader over a Parquet record file: one Arrow batch in memory at a
/// time, one decoded [`Record`] per `next()`.
pub struct ParquetSource {
    reader: ParquetRecordBatchReader,
    current: Option<RecordBatch>,
    row: usize,
    /// Global record position, for diagnostics.
    position: usize,
}

impl ParquetSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening record file {}", path.display()))?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
        let reader = builder.build().context("building parquet reader")?;
        Ok(ParquetSource {
            reader,
            current: None,
            row: 0,
            position: 0,
        })
    }
}

impl Iterator for ParquetSource {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = self.current.take() {
                if self.row < batch.num_rows() {
                    let result = decode_row(&batch, self.row, self.position);
                    self.row += 1;
                    self.position += 1;
                    self.current = Some(batch);
                    return Some(result);
                }
            }
            match self.reader.next() {
                None => return None,
                Some(Ok(batch)) => {
                    self.current = Some(batch);
                    self.row = 0;
                }
                Some(Err(e)) => {
                    return Some(Err(
                        anyhow::Error::new(e).context("reading parquet record batch")
                    ))
                }
            }
        }
    }
}

/// Decode one Parquet row into a [`Record`]. A missing column, null cell, or
/// wrong payload length fails the record.
fn decode_row(batch: &RecordBatch, row: usize, position: usize) -> Result<Record> {
    let id = int_value(required_column(batch, "id", position)?, row, position, "id")?;
    let label = int_value(
        required_column(batch, "label", position)?,
        row,
        position,
        "label",
    )?;
    let z = float_value(required_column(batch, "z", position)?, row, position, "z")?;
    let z_err = float_value(
        required_column(batch, "z_err", position)?,
        row,
        position,
        "z_err",
    )?;
    let payload = bytes_value(
        required_column(batch, "image_raw", position)?,
        row,
        position,
        "image_raw",
    )?;

    let heatmap = Heatmap::decode(&payload, NUM_WAVELENGTH_BINS, NUM_TIME_BINS)
        .with_context(|| format!("record {position} (snid {id}): bad heatmap payload"))?;

    Ok(Record {
        id,
        label,
        redshift: z,
        redshift_err: z_err,
        flux: heatmap.flux,
        flux_err: heatmap.flux_err,
    })
}

fn required_column<'a>(
    batch: &'a RecordBatch,
    field: &'static str,
    position: usize,
) -> Result<&'a ArrayRef, DecodeError> {
    let idx = batch
        .schema()
        .index_of(field)
        .map_err(|_| DecodeError::MissingField {
            row: position,
            field,
        })?;
    Ok(batch.column(idx))
}

fn check_not_null(
    col: &ArrayRef,
    row: usize,
    position: usize,
    field: &'static str,
) -> Result<(), DecodeError> {
    if col.is_null(row) {
        Err(DecodeError::NullField {
            row: position,
            field,
        })
    } else {
        Ok(())
    }
}

fn int_value(
    col: &ArrayRef,
    row: usize,
    position: usize,
    field: &'static str,
) -> Result<i64, DecodeError> {
    check_not_null(col, row, position, field)?;
    match col.data_type() {
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>().ok_or_else(|| {
                type_error(col, position, field)
            })?;
            Ok(arr.value(row))
        }
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>().ok_or_else(|| {
                type_error(col, position, field)
            })?;
            Ok(arr.value(row) as i64)
        }
        _ => Err(type_error(col, position, field)),
    }
}

fn float_value(
    col: &ArrayRef,
    row: usize,
    position: usize,
    field: &'static str,
) -> Result<f32, DecodeError> {
    check_not_null(col, row, position, field)?;
    match col.data_type() {
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>().ok_or_else(|| {
                type_error(col, position, field)
            })?;
            Ok(arr.value(row))
        }
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>().ok_or_else(|| {
                type_error(col, position, field)
            })?;
            Ok(arr.value(row) as f32)
        }
        _ => Err(type_error(col, position, field)),
    }
}

fn bytes_value(
    col: &ArrayRef,
    row: usize,
    position: usize,
    field: &'static str,
) -> Result<Vec<u8>, DecodeError> {
    check_not_null(col, row, position, field)?;
    match col.data_type() {
        DataType::Binary => {
            let arr = col.as_any().downcast_ref::<BinaryArray>().ok_or_else(|| {
                type_error(col, position, field)
            })?;
            Ok(arr.value(row).to_vec())
        }
        DataType::LargeBinary => {
            let arr = col
                .as_any()
                .downcast_ref::<LargeBinaryArray>()
                .ok_or_else(|| type_error(col, position, field))?;
            Ok(arr.value(row).to_vec())
        }
        _ => Err(type_error(col, position, field)),
    }
}

fn type_error(col: &ArrayRef, position: usize, field: &'static str) -> DecodeError {
    DecodeError::FieldType {
        row: position,
        field,
        found: format!("{:?}", col.data_type()),
    }
}

// ---------------------------------------------------------------------------
// JSON source
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct JsonRecord {
    id: i64,
    label: i64,
    z: f32,
    z_err: f32,
    flux: Vec<Vec<f64>>,
    flux_err: Vec<Vec<f64>>,
}

/// Load all records from a JSON fixture file. Grids must be exactly
/// `NUM_WAVELENGTH_BINS` rows of `NUM_TIME_BINS` values.
fn load_json(path: &Path) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading record file {}", path.display()))?;
    let raw: Vec<JsonRecord> = serde_json::from_str(&text).context("parsing JSON records")?;

    let mut records = Vec::with_capacity(raw.len());
    for (i, rec) in raw.into_iter().enumerate() {
        let flux = nested_grid(rec.flux, i, "flux")?;
        let flux_err = nested_grid(rec.flux_err, i, "flux_err")?;
        records.push(Record {
            id: rec.id,
            label: rec.label,
            redshift: rec.z,
            redshift_err: rec.z_err,
            flux,
            flux_err,
        });
    }
    Ok(records)
}

fn nested_grid(rows: Vec<Vec<f64>>, position: usize, field: &'static str) -> Result<Grid> {
    let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
    let shape_err = |rows: &[Vec<f64>], cols: usize| DecodeError::GridShape {
        row: position,
        field,
        rows: rows.len(),
        cols,
        expected_rows: NUM_WAVELENGTH_BINS,
        expected_cols: NUM_TIME_BINS,
    };

    if rows.len() != NUM_WAVELENGTH_BINS || n_cols != NUM_TIME_BINS {
        return Err(shape_err(&rows, n_cols).into());
    }
    let mut values = Vec::with_capacity(NUM_WAVELENGTH_BINS * NUM_TIME_BINS);
    for r in &rows {
        if r.len() != NUM_TIME_BINS {
            return Err(shape_err(&rows, r.len()).into());
        }
        values.extend_from_slice(r);
    }
    Ok(Grid::new(NUM_WAVELENGTH_BINS, NUM_TIME_BINS, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BinaryBuilder, Float32Builder, Int64Builder};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;
    use serde_json::json;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("heatmap_extract_{}_{}", std::process::id(), name))
    }

    fn full_grid(fill: f64) -> Vec<Vec<f64>> {
        vec![vec![fill; NUM_TIME_BINS]; NUM_WAVELENGTH_BINS]
    }

    #[test]
    fn json_source_round_trips_a_record() {
        let mut flux = full_grid(0.0);
        flux[3][7] = 42.0;
        let doc = json!([{
            "id": 1009, "label": 1, "z": 0.21, "z_err": 0.02,
            "flux": flux, "flux_err": full_grid(0.5),
        }]);
        let path = temp_path("fixture.json");
        std::fs::write(&path, doc.to_string()).unwrap();

        let records: Vec<Record> = open(&path).unwrap().collect::<Result<_>>().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1009);
        assert_eq!(records[0].flux.get(3, 7), 42.0);
        assert_eq!(records[0].flux_err.get(0, 0), 0.5);
    }

    #[test]
    fn json_source_rejects_wrong_grid_shape() {
        let doc = json!([{
            "id": 1, "label": 0, "z": 0.1, "z_err": 0.01,
            "flux": [[1.0, 2.0]], "flux_err": [[0.0, 0.0]],
        }]);
        let path = temp_path("bad_shape.json");
        std::fs::write(&path, doc.to_string()).unwrap();

        let result: Result<Vec<Record>> = open(&path).unwrap().collect();
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        assert!(open(Path::new("records.txt")).is_err());
    }

    fn write_parquet(path: &Path, payloads: &[Vec<u8>]) {
        let mut id_b = Int64Builder::new();
        let mut label_b = Int64Builder::new();
        let mut z_b = Float32Builder::new();
        let mut z_err_b = Float32Builder::new();
        let mut image_b = BinaryBuilder::new();
        for (i, payload) in payloads.iter().enumerate() {
            id_b.append_value(1000 + i as i64);
            label_b.append_value((i % 2) as i64);
            z_b.append_value(0.1 * (i + 1) as f32);
            z_err_b.append_value(0.01);
            image_b.append_value(payload);
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
                Arc::new(id_b.finish()),
                Arc::new(label_b.finish()),
                Arc::new(z_b.finish()),
                Arc::new(z_err_b.finish()),
                Arc::new(image_b.finish()),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn parquet_source_preserves_order_and_decodes_payloads() {
        let n = NUM_WAVELENGTH_BINS * NUM_TIME_BINS;
        let mut payload = Vec::with_capacity(n * 16);
        for i in 0..n {
            payload.extend_from_slice(&(i as f64).to_le_bytes());
            payload.extend_from_slice(&1.0f64.to_le_bytes());
        }
        let payloads = vec![payload.clone(), payload];
        let path = temp_path("records.parquet");
        write_parquet(&path, &payloads);

        let records: Vec<Record> = open(&path).unwrap().collect::<Result<_>>().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1000);
        assert_eq!(records[1].id, 1001);
        // Wavelength-major layout: value at (w, t) is w * NUM_TIME_BINS + t.
        assert_eq!(records[0].flux.get(2, 3), (2 * NUM_TIME_BINS + 3) as f64);
        assert_eq!(records[0].flux_err.get(2, 3), 1.0);
    }

    #[test]
    fn parquet_source_fails_on_short_payload() {
        let path = temp_path("short.parquet");
        write_parquet(&path, &[vec![0u8; 16]]);

        let result: Result<Vec<Record>> = open(&path).unwrap().collect();
        std::fs::remove_file(&path).ok();
        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("snid 1000"), "diagnostic was: {err}");
    }
}
