//! Frequency-stability analysis for counter measurements.
//!
//! Takes timestamped frequency readings (comb beats, counter logs) and
//! produces the two standard oscillator-noise characterizations: Allan
//! family deviations over averaging time and the amplitude spectral
//! density of the frequency fluctuations, both with jackknife error bands
//! estimated from contiguous chops of the record. A small styling layer
//! assigns consistent colours and dash patterns to curves grouped by
//! measurement session; rendering itself is left to the caller.

pub mod data;
pub mod error;
pub mod stats;
pub mod style;

pub use data::loader::{TimeUnit, fokus2_txt, generic_freq_counter, pendulum_cnt91_txt};
pub use data::series::TimeSeries;
pub use error::AnalysisError;
pub use stats::ErrorBand;
pub use stats::deviation::{
    DeviationMethod, DeviationOptions, DeviationResult, deviation, deviation_curve, generate_taus,
};
pub use stats::spectral::{
    SpectralDensityResult, SpectralOptions, spectral_density, spectral_density_with_error,
};
pub use style::{LineStyle, StyleSequencer, generate_palette, label, si_format};
