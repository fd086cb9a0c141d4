/// Data layer: core types, payload decoding, and record sources.
///
/// Architecture:
/// ```text
///  .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  source   │  stream rows → decoded Records
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  Grid, Heatmap payload codec, Record
///   └──────────┘
/// ```
pub mod model;
pub mod source;
