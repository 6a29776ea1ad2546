//! Statistics layer: the deviation and spectral estimators plus the chop
//! jackknife they share for error bands.
//!
//! Architecture:
//! ```text
//!   TimeSeries
//!        │
//!        ├────────────────┐
//!        ▼                ▼
//!   ┌───────────┐   ┌──────────┐
//!   │ deviation │   │ spectral │   adev / oadev / totdev · Welch ASD
//!   └───────────┘   └──────────┘
//!        │                │
//!        ▼                ▼
//!   result record + optional ErrorBand
//! ```

use serde::{Deserialize, Serialize};

use crate::data::series::TimeSeries;
use crate::error::AnalysisError;

pub mod deviation;
pub mod spectral;

// ---------------------------------------------------------------------------
// Jackknife error machinery shared by both engines
// ---------------------------------------------------------------------------

/// Uncertainty band for a computed curve.
///
/// The band is anchored at its own axis, which may be coarser than the main
/// curve's: `taus` holds averaging times in seconds for deviation bands and
/// frequencies in Hz for spectral bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBand {
    /// Anchor axis of the band.
    pub taus: Vec<f64>,
    /// Mean minus one standard error, per anchor.
    pub lower: Vec<f64>,
    /// Mean plus one standard error, per anchor.
    pub upper: Vec<f64>,
}

/// Partition `series` into `chops` contiguous equal-length windows.
///
/// Window `idx` keeps the samples of its own slice only, obtained by
/// trimming `idx` slices from the front and the rest from the back. A
/// remainder from the integer division extends every window symmetrically.
pub(crate) fn chop_series(
    series: &TimeSeries,
    chops: usize,
) -> Result<Vec<TimeSeries>, AnalysisError> {
    if chops == 0 {
        return Err(AnalysisError::InvalidInput(
            "chop count must be at least 1".to_string(),
        ));
    }
    let slice = series.len() / chops;
    if slice == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "cannot split {} samples into {chops} chops",
            series.len()
        )));
    }
    (0..chops)
        .map(|idx| series.trim(idx * slice, (chops - 1 - idx) * slice))
        .collect()
}

/// Elementwise mean ∓ standard error across per-chop curves.
pub(crate) fn jackknife_band(anchors: Vec<f64>, curves: &[Vec<f64>]) -> ErrorBand {
    let chops = curves.len() as f64;
    let mut lower = Vec::with_capacity(anchors.len());
    let mut upper = Vec::with_capacity(anchors.len());
    for point in 0..anchors.len() {
        let mean = curves.iter().map(|curve| curve[point]).sum::<f64>() / chops;
        let variance = curves
            .iter()
            .map(|curve| (curve[point] - mean).powi(2))
            .sum::<f64>()
            / chops;
        let stderr = variance.sqrt() / chops.sqrt();
        lower.push(mean - stderr);
        upper.push(mean + stderr);
    }
    ErrorBand {
        taus: anchors,
        lower,
        upper,
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
