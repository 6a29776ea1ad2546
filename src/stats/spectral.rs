use std::f64::consts::PI;

use log::debug;
use rustfft::{FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};

use super::{ErrorBand, chop_series, jackknife_band};
use crate::data::series::TimeSeries;
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Options and result record
// ---------------------------------------------------------------------------

/// Tuning knobs for the spectral estimator.
#[derive(Debug, Clone)]
pub struct SpectralOptions {
    /// Leading frequency bins to discard. The lowest bins are dominated by
    /// detrending residue and window leakage.
    pub drop_head: usize,
    /// Number of jackknife chops behind the error band.
    pub chops: usize,
}

impl Default for SpectralOptions {
    fn default() -> Self {
        Self {
            drop_head: 6,
            chops: 10,
        }
    }
}

/// An amplitude spectral density estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralDensityResult {
    /// The analyzed series.
    pub series: TimeSeries,
    /// Frequency bins in Hz, strictly increasing.
    pub frequencies: Vec<f64>,
    /// Amplitude per bin, in input units per √Hz.
    pub amplitudes: Vec<f64>,
    /// Jackknife error band, anchored at the chop frequency grid.
    pub errors: Option<ErrorBand>,
}

// ---------------------------------------------------------------------------
// Welch estimator
// ---------------------------------------------------------------------------

/// Welch PSD with segment sizing tied to the record length: segments of
/// `2^(⌊log2 n⌋ - 5)` samples, zero-padded to a `2^(⌊log2 n⌋ - 3)`-point
/// FFT. Hann window, half-overlapping segments, per-segment mean removal,
/// one-sided density scaling, mean across segments.
fn welch_psd(values: &[f64], rate: f64) -> Result<(Vec<f64>, Vec<f64>), AnalysisError> {
    let n = values.len();
    let n_pow = n.ilog2();
    if n_pow < 6 {
        return Err(AnalysisError::InvalidInput(format!(
            "{n} samples are too few for a spectral estimate"
        )));
    }
    let nperseg = 1usize << (n_pow - 5);
    let nfft = 1usize << (n_pow - 3);
    let noverlap = nperseg / 2;
    let step = nperseg - noverlap;
    let segments = (n - noverlap) / step;
    debug!("welch: {segments} segments of {nperseg} samples, {nfft}-point FFT");

    // Periodic Hann window and its density normalization.
    let window: Vec<f64> = (0..nperseg)
        .map(|k| 0.5 - 0.5 * (2.0 * PI * k as f64 / nperseg as f64).cos())
        .collect();
    let window_ssq: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (rate * window_ssq);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nfft);

    let bins = nfft / 2 + 1;
    let mut psd = vec![0.0; bins];
    let mut buffer = vec![Complex::new(0.0, 0.0); nfft];
    for segment in 0..segments {
        let start = segment * step;
        let slice = &values[start..start + nperseg];
        let mean = slice.iter().sum::<f64>() / nperseg as f64;
        for (slot, (&value, &weight)) in
            buffer.iter_mut().zip(slice.iter().zip(window.iter()))
        {
            *slot = Complex::new((value - mean) * weight, 0.0);
        }
        for slot in buffer.iter_mut().skip(nperseg) {
            *slot = Complex::new(0.0, 0.0);
        }
        fft.process(&mut buffer);
        for (bin, slot) in psd.iter_mut().zip(buffer.iter()) {
            *bin += slot.norm_sqr() * scale;
        }
    }
    for bin in psd.iter_mut() {
        *bin /= segments as f64;
    }
    // One-sided spectrum: fold the negative frequencies into every bin
    // except DC and Nyquist.
    for bin in psd.iter_mut().take(nfft / 2).skip(1) {
        *bin *= 2.0;
    }

    let frequencies = (0..bins).map(|i| i as f64 * rate / nfft as f64).collect();
    Ok((frequencies, psd))
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Computes the amplitude spectral density of the frequency readings,
/// without an error band.
///
/// The output is the square root of the Welch PSD with the first
/// `drop_head` bins removed.
pub fn spectral_density(
    series: &TimeSeries,
    options: &SpectralOptions,
) -> Result<SpectralDensityResult, AnalysisError> {
    let (frequencies, psd) = welch_psd(series.values(), series.sample_rate())?;
    if psd.len() <= options.drop_head {
        return Err(AnalysisError::InvalidInput(format!(
            "spectral estimate has only {} bins, cannot drop the first {}",
            psd.len(),
            options.drop_head
        )));
    }
    let frequencies = frequencies[options.drop_head..].to_vec();
    let amplitudes = psd[options.drop_head..]
        .iter()
        .map(|power| power.sqrt())
        .collect();
    Ok(SpectralDensityResult {
        series: series.clone(),
        frequencies,
        amplitudes,
        errors: None,
    })
}

/// Computes the amplitude spectral density plus its jackknife error band.
///
/// Every chop is a shorter record, so the band lives on a coarser
/// frequency grid than the main curve; all chops must agree on that grid.
/// A record whose sample rate drifts between chops fails with
/// [`AnalysisError::InternalConsistency`], since the chop grids then
/// diverge.
pub fn spectral_density_with_error(
    series: &TimeSeries,
    options: &SpectralOptions,
) -> Result<SpectralDensityResult, AnalysisError> {
    let mut result = spectral_density(series, options)?;
    let chops = chop_series(series, options.chops)?;

    let mut grid: Vec<f64> = Vec::new();
    let mut curves: Vec<Vec<f64>> = Vec::with_capacity(chops.len());
    for (idx, chop) in chops.iter().enumerate() {
        let curve = spectral_density(chop, options)?;
        if idx == 0 {
            grid = curve.frequencies;
        } else if curve.frequencies != grid {
            return Err(AnalysisError::InternalConsistency(
                "jackknife chops disagree on the frequency grid".to_string(),
            ));
        }
        curves.push(curve.amplitudes);
    }
    result.errors = Some(jackknife_band(grid, &curves));
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::stats::testutil::{drifting_series, white_noise_series};

    fn no_drop() -> SpectralOptions {
        SpectralOptions {
            drop_head: 0,
            ..Default::default()
        }
    }

    #[test]
    fn segment_sizing_sets_the_bin_grid() {
        // 4096 samples: 128-sample segments, 512-point FFT, 257 bins.
        let series = white_noise_series(4096, 1.0, 3);
        let result = spectral_density(&series, &no_drop()).unwrap();
        assert_eq!(result.frequencies.len(), 257);
        assert_approx_eq!(result.frequencies[0], 0.0, 1e-15);
        assert_approx_eq!(result.frequencies[1], 1.0 / 512.0, 1e-15);
        assert_approx_eq!(*result.frequencies.last().unwrap(), 0.5, 1e-15);
    }

    #[test]
    fn drop_head_removes_exactly_the_leading_bins() {
        let series = white_noise_series(4096, 1.0, 3);
        let raw = spectral_density(&series, &no_drop()).unwrap();
        let cut = spectral_density(&series, &SpectralOptions::default()).unwrap();
        assert_eq!(cut.frequencies.len(), raw.frequencies.len() - 6);
        assert_eq!(&cut.frequencies[..], &raw.frequencies[6..]);
        assert_eq!(&cut.amplitudes[..], &raw.amplitudes[6..]);
    }

    #[test]
    fn white_noise_floor_sits_at_sqrt_two_sigma_squared_over_rate() {
        // One-sided PSD of unit white noise at 1 Hz is flat at 2.
        let series = white_noise_series(8192, 1.0, 11);
        let result = spectral_density(&series, &SpectralOptions::default()).unwrap();
        let mean =
            result.amplitudes.iter().sum::<f64>() / result.amplitudes.len() as f64;
        assert_approx_eq!(mean, 2.0_f64.sqrt(), 0.07);
    }

    #[test]
    fn sine_peak_lands_on_its_bin() {
        // A 1/16 Hz tone falls exactly on bin 32 of the 512-point grid.
        let n = 4096;
        let timestamps: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let values: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * i as f64 / 16.0).sin())
            .collect();
        let series = TimeSeries::new(timestamps, values).unwrap();
        let result = spectral_density(&series, &SpectralOptions::default()).unwrap();
        let peak = result
            .amplitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap();
        assert_approx_eq!(result.frequencies[peak], 1.0 / 16.0, 1e-12);
    }

    #[test]
    fn short_records_are_invalid_input() {
        // 32 samples: segment length collapses below 2.
        let series = white_noise_series(32, 1.0, 5);
        let result = spectral_density(&series, &no_drop());
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
        // 64 samples leave 5 bins, fewer than the default drop_head.
        let series = white_noise_series(64, 1.0, 5);
        let result = spectral_density(&series, &SpectralOptions::default());
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn chops_disagreeing_on_the_frequency_grid_is_internal_consistency() {
        // Clock drift splits the chops across two sample rates, so their
        // Welch bin grids cannot line up.
        let series = drifting_series(10240);
        assert!(spectral_density(&series, &SpectralOptions::default()).is_ok());
        let result = spectral_density_with_error(&series, &SpectralOptions::default());
        assert!(matches!(
            result,
            Err(AnalysisError::InternalConsistency(_))
        ));
    }

    #[test]
    fn error_band_shares_the_chop_frequency_grid() {
        let series = white_noise_series(10240, 1.0, 7);
        let result = spectral_density_with_error(&series, &SpectralOptions::default()).unwrap();
        let band = result.errors.unwrap();

        let chop0 = series.trim(0, 9216).unwrap();
        let direct = spectral_density(&chop0, &SpectralOptions::default()).unwrap();
        assert_eq!(band.taus, direct.frequencies);
        assert!(band.lower.iter().zip(&band.upper).all(|(lo, hi)| lo < hi));
    }

    #[test]
    fn error_band_brackets_the_white_noise_floor() {
        let series = white_noise_series(10240, 1.0, 19);
        let result = spectral_density_with_error(&series, &SpectralOptions::default()).unwrap();
        let band = result.errors.unwrap();
        let floor = 2.0_f64.sqrt();
        let below = band.lower.iter().filter(|&&lo| lo < floor).count();
        let above = band.upper.iter().filter(|&&hi| hi > floor).count();
        // The one-sigma band catches the true level at most anchors.
        assert!(below > band.lower.len() / 2);
        assert!(above > band.upper.len() / 2);
    }
}
