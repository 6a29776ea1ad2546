use thiserror::Error;

/// Errors surfaced by the analysis core.
///
/// Loader problems (missing files, unparsable rows) are reported through
/// `anyhow` at the file boundary instead; this enum covers the numeric
/// pipeline only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Malformed or degenerate series data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Sample spacing jitter beyond the caller's tolerance. The deviation
    /// estimators assume near-uniform sampling.
    #[error("sampling too irregular: regularity {regularity} exceeds allowed {allowed}")]
    IrregularSampling { regularity: f64, allowed: f64 },
    /// Jackknife chops disagree on structural output. Usually a logic bug,
    /// though a record whose sample rate drifts between chops while staying
    /// inside the irregularity tolerance lands here too.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),
}
