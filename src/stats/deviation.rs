use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{ErrorBand, chop_series, jackknife_band};
use crate::data::series::TimeSeries;
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Method selection, options, result record
// ---------------------------------------------------------------------------

/// Which member of the Allan deviation family to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationMethod {
    /// Non-overlapping Allan deviation.
    Adev,
    /// Overlapping Allan deviation. Uses every available phase triple and
    /// is the customary default.
    Oadev,
    /// Total deviation (Howe 2000): the record is reflected about both ends
    /// before differencing, which tames the estimate at long averaging
    /// times.
    Totdev,
}

impl DeviationMethod {
    /// Short identifier, e.g. for legends and export.
    pub fn name(&self) -> &'static str {
        match self {
            DeviationMethod::Adev => "adev",
            DeviationMethod::Oadev => "oadev",
            DeviationMethod::Totdev => "totdev",
        }
    }
}

impl fmt::Display for DeviationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tuning knobs for a deviation computation.
#[derive(Debug, Clone)]
pub struct DeviationOptions {
    /// Estimator to apply.
    pub method: DeviationMethod,
    /// Averaging times to evaluate, in seconds. `None` generates a
    /// geometric set from the series itself.
    pub taus: Option<Vec<f64>>,
    /// Largest [`sampling_regularity`](TimeSeries::sampling_regularity)
    /// accepted before refusing to compute.
    pub allowable_irregularity: f64,
    /// Number of jackknife chops behind the error band.
    pub chops: usize,
}

impl Default for DeviationOptions {
    fn default() -> Self {
        Self {
            method: DeviationMethod::Oadev,
            taus: None,
            allowable_irregularity: 1.05,
            chops: 10,
        }
    }
}

/// A computed deviation curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationResult {
    /// Estimator that produced the curve.
    pub method: DeviationMethod,
    /// The analyzed series.
    pub series: TimeSeries,
    /// Averaging times actually evaluated, in seconds. Requested taus are
    /// quantized to sample-interval multiples, deduplicated, and thinned of
    /// entries the estimator cannot support, so this can differ from the
    /// request.
    pub taus: Vec<f64>,
    /// Deviation per tau; fractional frequency if the series carries an
    /// original frequency, absolute Hz otherwise.
    pub devs: Vec<f64>,
    /// Jackknife error band, anchored at its own tau axis.
    pub errors: Option<ErrorBand>,
}

// ---------------------------------------------------------------------------
// Tau generation
// ---------------------------------------------------------------------------

/// Points in a generated tau set.
const TAU_COUNT: usize = 300;
/// Upper tau bound as a fraction of the record duration for main curves.
const CURVE_TAU_FRACTION: f64 = 0.01;
/// Upper tau bound fraction for jackknife chops, which are ten times
/// shorter than the record they come from.
const CHOP_TAU_FRACTION: f64 = 0.1;

/// Generates a conservative geometric tau set for `series`: `n_taus` points
/// from two sample intervals up to `duration * until`.
///
/// Deviations beyond a small fraction of the record rest on too few
/// independent differences to be trustworthy, hence the cutoff.
pub fn generate_taus(series: &TimeSeries, n_taus: usize, until: f64) -> Vec<f64> {
    geomspace(
        2.0 / series.sample_rate(),
        series.duration() * until,
        n_taus,
    )
}

/// Geometric progression including both endpoints.
fn geomspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    if num == 1 {
        return vec![start];
    }
    let log_start = start.ln();
    let log_step = (stop / start).ln() / (num - 1) as f64;
    let mut points: Vec<f64> = (0..num)
        .map(|i| (log_start + log_step * i as f64).exp())
        .collect();
    points[0] = start;
    points[num - 1] = stop;
    points
}

/// Quantizes requested taus to the integer averaging factors the
/// estimators operate on: `m = floor(tau * rate)`, deduplicated and sorted,
/// with out-of-range requests discarded.
fn quantize_taus(taus: &[f64], rate: f64, phase_len: usize) -> Vec<usize> {
    let max_tau = phase_len as f64 / rate;
    let mut factors: Vec<usize> = taus
        .iter()
        .filter(|&&tau| tau > 0.0 && tau < max_tau)
        .map(|&tau| (tau * rate).floor() as usize)
        .filter(|&m| m >= 1)
        .collect();
    factors.sort_unstable();
    factors.dedup();
    factors
}

// ---------------------------------------------------------------------------
// Estimators
// ---------------------------------------------------------------------------

/// Integrates frequency readings into phase, starting at zero.
fn frequency_to_phase(values: &[f64], rate: f64) -> Vec<f64> {
    let dt = 1.0 / rate;
    let mut phase = Vec::with_capacity(values.len() + 1);
    phase.push(0.0);
    let mut acc = 0.0;
    for &value in values {
        acc += value * dt;
        phase.push(acc);
    }
    phase
}

/// Allan second-difference estimate over phase data at averaging factor
/// `m`, advancing by `stride` between differences. `stride == m` gives the
/// non-overlapping estimator, `stride == 1` the overlapping one.
///
/// Returns `(deviation, number of differences)`.
fn allan_at(phase: &[f64], rate: f64, m: usize, stride: usize) -> (f64, usize) {
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut i = 0usize;
    while i + 2 * m < phase.len() {
        let diff = phase[i + 2 * m] - 2.0 * phase[i + m] + phase[i];
        sum += diff * diff;
        count += 1;
        i += stride;
    }
    if count == 0 {
        return (0.0, 0);
    }
    let tau = m as f64 / rate;
    ((sum / (2.0 * count as f64)).sqrt() / tau, count)
}

/// Reflects the phase record about both endpoints, the extension totdev
/// differences across. Returns the extended record and the count of
/// interior centers.
fn extend_phase(phase: &[f64]) -> (Vec<f64>, usize) {
    let len = phase.len();
    let mid = len - 2;
    let mut extended = Vec::with_capacity(3 * len - 4);
    for j in 0..mid {
        extended.push(2.0 * phase[0] - phase[len - 2 - j]);
    }
    extended.extend_from_slice(phase);
    for j in 0..mid {
        extended.push(2.0 * phase[len - 1] - phase[len - 2 - j]);
    }
    (extended, mid)
}

/// Total deviation at averaging factor `m` over the reflection-extended
/// phase record: every interior point is a difference center, normalized by
/// `2 τ² (N - 2)` (Howe 2000).
fn totdev_at(extended: &[f64], mid: usize, rate: f64, m: usize) -> (f64, usize) {
    if m > mid + 1 {
        return (0.0, 0);
    }
    let mut sum = 0.0;
    for i in 0..mid {
        let center = mid + 1 + i;
        let diff = extended[center - m] - 2.0 * extended[center] + extended[center + m];
        sum += diff * diff;
    }
    let tau = m as f64 / rate;
    ((sum / (2.0 * tau * tau * mid as f64)).sqrt(), mid)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Computes a deviation curve without an error band.
///
/// Refuses series whose sampling regularity exceeds the allowed bound,
/// since the estimators assume a uniform grid. Taus come from the options
/// or, when absent, from [`generate_taus`] with the conservative 1 %
/// duration cutoff.
pub fn deviation_curve(
    series: &TimeSeries,
    options: &DeviationOptions,
) -> Result<DeviationResult, AnalysisError> {
    check_regularity(series, options.allowable_irregularity)?;
    let requested = match &options.taus {
        Some(taus) => taus.clone(),
        None => generate_taus(series, TAU_COUNT, CURVE_TAU_FRACTION),
    };
    let (taus, mut devs) = curve_points(series, options.method, &requested)?;
    if let Some(frequency) = series.original_frequency() {
        for dev in &mut devs {
            *dev /= frequency;
        }
    }
    Ok(DeviationResult {
        method: options.method,
        series: series.clone(),
        taus,
        devs,
        errors: None,
    })
}

/// Computes a deviation curve plus its jackknife error band.
///
/// The band splits the record into equal chops, evaluates every chop at one
/// shared tau set generated from the first chop, and spans mean ∓ standard
/// error across chops. Its tau axis is therefore coarser than the main
/// curve's. A record whose sample rate drifts between chops fails with
/// [`AnalysisError::InternalConsistency`] even when the irregularity gate
/// tolerates the drift overall.
pub fn deviation(
    series: &TimeSeries,
    options: &DeviationOptions,
) -> Result<DeviationResult, AnalysisError> {
    let mut result = deviation_curve(series, options)?;
    result.errors = Some(estimate_error(series, options)?);
    Ok(result)
}

fn estimate_error(
    series: &TimeSeries,
    options: &DeviationOptions,
) -> Result<ErrorBand, AnalysisError> {
    let chops = chop_series(series, options.chops)?;
    let shared = generate_taus(&chops[0], TAU_COUNT, CHOP_TAU_FRACTION);
    let chop_options = DeviationOptions {
        taus: Some(shared),
        ..options.clone()
    };

    let mut axis: Vec<f64> = Vec::new();
    let mut curves: Vec<Vec<f64>> = Vec::with_capacity(chops.len());
    for (idx, chop) in chops.iter().enumerate() {
        let curve = deviation_curve(chop, &chop_options)?;
        if idx == 0 {
            axis = curve.taus;
        } else if curve.taus != axis {
            return Err(AnalysisError::InternalConsistency(
                "jackknife chops disagree on the shared tau axis".to_string(),
            ));
        }
        curves.push(curve.devs);
    }
    Ok(jackknife_band(axis, &curves))
}

fn check_regularity(series: &TimeSeries, allowed: f64) -> Result<(), AnalysisError> {
    let regularity = series.sampling_regularity();
    if regularity > allowed {
        return Err(AnalysisError::IrregularSampling {
            regularity,
            allowed,
        });
    }
    Ok(())
}

/// Runs the selected estimator over the quantized tau set, thinning taus
/// the estimator has fewer than two differences for.
fn curve_points(
    series: &TimeSeries,
    method: DeviationMethod,
    requested: &[f64],
) -> Result<(Vec<f64>, Vec<f64>), AnalysisError> {
    let rate = series.sample_rate();
    let phase = frequency_to_phase(series.values(), rate);
    let factors = quantize_taus(requested, rate, phase.len());
    if factors.is_empty() {
        return Err(AnalysisError::InvalidInput(format!(
            "none of the {} requested taus fit a {}-sample record",
            requested.len(),
            series.len()
        )));
    }
    let quantized: Vec<f64> = factors.iter().map(|&m| m as f64 / rate).collect();
    if quantized.as_slice() != requested {
        debug!(
            "quantized {} requested taus into {} averaging factors",
            requested.len(),
            factors.len()
        );
    }

    let (extended, mid) = if method == DeviationMethod::Totdev {
        extend_phase(&phase)
    } else {
        (Vec::new(), 0)
    };

    let mut taus = Vec::with_capacity(factors.len());
    let mut devs = Vec::with_capacity(factors.len());
    let mut dropped = 0usize;
    for (&m, &tau) in factors.iter().zip(&quantized) {
        let (dev, count) = match method {
            DeviationMethod::Adev => allan_at(&phase, rate, m, m),
            DeviationMethod::Oadev => allan_at(&phase, rate, m, 1),
            DeviationMethod::Totdev => totdev_at(&extended, mid, rate, m),
        };
        if count < 2 {
            dropped += 1;
            continue;
        }
        taus.push(tau);
        devs.push(dev);
    }
    if dropped > 0 {
        warn!("dropped {dropped} taus with fewer than two estimator differences");
    }
    if taus.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "no tau survives the minimum-difference requirement".to_string(),
        ));
    }
    Ok((taus, devs))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
