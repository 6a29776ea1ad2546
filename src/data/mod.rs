//! Data layer: the measurement model and counter-file parsers.
//!
//! Architecture:
//! ```text
//!  counter .txt logs
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader  │  parse file → TimeSeries
//!   └──────────┘
//!        │
//!        ▼
//!   ┌────────────┐
//!   │ TimeSeries │  (timestamp, frequency) samples, derived rate
//!   └────────────┘
//!        │
//!        ▼
//!   stats engines (deviation, spectral)
//! ```

pub mod loader;
pub mod series;
