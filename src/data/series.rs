use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// TimeSeries – one counter measurement
// ---------------------------------------------------------------------------

/// A series of timestamped frequency readings, as logged by a counter.
///
/// Timestamps must be finite and strictly increasing. The sample rate is
/// derived from the median inter-sample interval at construction; irregular
/// spacing is surfaced through
/// [`sampling_regularity`](TimeSeries::sampling_regularity) and left to
/// consumers to accept or refuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    timestamps: Vec<f64>,
    values: Vec<f64>,
    original_frequency: Option<f64>,
    session: Option<String>,
    sample_rate: f64,
    sampling_regularity: f64,
}

impl TimeSeries {
    /// Builds a series from parallel timestamp (seconds) and frequency (Hz)
    /// vectors.
    pub fn new(timestamps: Vec<f64>, values: Vec<f64>) -> Result<Self, AnalysisError> {
        if timestamps.len() != values.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "{} timestamps but {} values",
                timestamps.len(),
                values.len()
            )));
        }
        if timestamps.len() < 2 {
            return Err(AnalysisError::InvalidInput(
                "at least 2 samples are required".to_string(),
            ));
        }
        // NaN compares false against everything, so the monotonicity
        // check alone would wave a corrupted time axis through.
        if timestamps.iter().any(|t| !t.is_finite()) {
            return Err(AnalysisError::InvalidInput(
                "timestamps must be finite".to_string(),
            ));
        }
        if timestamps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalysisError::InvalidInput(
                "timestamps are not strictly increasing".to_string(),
            ));
        }
        let (sample_rate, sampling_regularity) = analyze_intervals(&timestamps);
        Ok(TimeSeries {
            timestamps,
            values,
            original_frequency: None,
            session: None,
            sample_rate,
            sampling_regularity,
        })
    }

    /// Attaches the carrier frequency the readings refer to.
    ///
    /// Signals are commonly mixed down before counting; deviations of a
    /// series carrying an original frequency are reported as fractional
    /// frequency instead of absolute Hz.
    pub fn with_original_frequency(mut self, frequency: f64) -> Self {
        self.original_frequency = Some(frequency);
        self
    }

    /// Attaches a label grouping measurements taken in one session.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Construction enforces at least two samples, so this only exists for
    /// generic callers.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Timestamps in seconds.
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Frequency readings in Hz.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Median sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// How far the sample spacing strays from uniform:
    /// `max(max_dt / median_dt, median_dt / min_dt)`, exactly 1.0 for a
    /// uniform grid.
    pub fn sampling_regularity(&self) -> f64 {
        self.sampling_regularity
    }

    /// Carrier frequency the readings are referenced to, if any.
    pub fn original_frequency(&self) -> Option<f64> {
        self.original_frequency
    }

    /// Session label, if any.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Measurement duration in seconds, first to last timestamp.
    pub fn duration(&self) -> f64 {
        self.timestamps[self.timestamps.len() - 1] - self.timestamps[0]
    }

    /// Derives a series with `head` samples removed from the front and
    /// `tail` from the back. Metadata is carried over; sample rate and
    /// regularity are recomputed from the remaining samples.
    pub fn trim(&self, head: usize, tail: usize) -> Result<TimeSeries, AnalysisError> {
        let len = self.len();
        let keep = len.saturating_sub(head).saturating_sub(tail);
        if keep < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "trimming {head} + {tail} samples leaves fewer than 2 of {len}"
            )));
        }
        let mut trimmed = TimeSeries::new(
            self.timestamps[head..len - tail].to_vec(),
            self.values[head..len - tail].to_vec(),
        )?;
        trimmed.original_frequency = self.original_frequency;
        trimmed.session = self.session.clone();
        Ok(trimmed)
    }
}

/// Derives (median sample rate in Hz, spacing regularity) from timestamps.
fn analyze_intervals(timestamps: &[f64]) -> (f64, f64) {
    let mut intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    intervals.sort_by(|a, b| a.total_cmp(b));
    let median = median_of_sorted(&intervals);
    let min = intervals[0];
    let max = intervals[intervals.len() - 1];
    (1.0 / median, (max / median).max(median / min))
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn uniform(n: usize, dt: f64) -> TimeSeries {
        let timestamps: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let values: Vec<f64> = (0..n).map(|i| 1e6 + i as f64).collect();
        TimeSeries::new(timestamps, values).unwrap()
    }

    #[test]
    fn uniform_sampling_has_regularity_one() {
        let series = uniform(100, 0.5);
        assert_approx_eq!(series.sampling_regularity(), 1.0, 1e-12);
        assert_approx_eq!(series.sample_rate(), 2.0, 1e-12);
    }

    #[test]
    fn jittered_sampling_is_surfaced_not_rejected() {
        // One interval 25 % longer than the rest.
        let series =
            TimeSeries::new(vec![0.0, 1.0, 2.0, 3.25], vec![5.0, 5.1, 5.2, 5.3]).unwrap();
        assert_approx_eq!(series.sampling_regularity(), 1.25, 1e-12);
        assert_approx_eq!(series.sample_rate(), 1.0, 1e-12);
    }

    #[test]
    fn non_monotonic_timestamps_are_rejected() {
        let result = TimeSeries::new(vec![0.0, 2.0, 1.0], vec![1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn duplicate_timestamps_are_rejected() {
        let result = TimeSeries::new(vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn non_finite_timestamps_are_rejected() {
        let mut timestamps: Vec<f64> = (0..64).map(|i| i as f64).collect();
        timestamps[10] = f64::NAN;
        let result = TimeSeries::new(timestamps, vec![1.0; 64]);
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));

        let result = TimeSeries::new(vec![0.0, 1.0, f64::INFINITY], vec![1.0; 3]);
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn at_least_two_samples_are_required() {
        assert!(TimeSeries::new(vec![], vec![]).is_err());
        assert!(TimeSeries::new(vec![0.0], vec![1.0]).is_err());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = TimeSeries::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0]);
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn duration_spans_first_to_last_timestamp() {
        let series = uniform(11, 2.0);
        assert_approx_eq!(series.duration(), 20.0, 1e-12);
    }

    #[test]
    fn trim_keeps_metadata_and_recomputes_rate() {
        let series = uniform(100, 1.0)
            .with_session("warmup")
            .with_original_frequency(1e9);
        let trimmed = series.trim(10, 5).unwrap();
        assert_eq!(trimmed.len(), 85);
        assert_approx_eq!(trimmed.timestamps()[0], 10.0, 1e-12);
        assert_approx_eq!(trimmed.sample_rate(), series.sample_rate(), 1e-12);
        assert_eq!(trimmed.session(), Some("warmup"));
        assert_eq!(trimmed.original_frequency(), Some(1e9));
    }

    #[test]
    fn trim_of_nothing_is_the_same_series() {
        let series = uniform(10, 1.0);
        let trimmed = series.trim(0, 0).unwrap();
        assert_eq!(trimmed.timestamps(), series.timestamps());
        assert_eq!(trimmed.values(), series.values());
    }

    #[test]
    fn trim_below_two_samples_fails() {
        let series = uniform(5, 1.0);
        assert!(series.trim(3, 1).is_err());
        assert!(series.trim(0, 4).is_err());
        assert!(series.trim(100, 0).is_err());
        assert!(series.trim(2, 1).is_ok());
    }
}
