use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;

use super::series::TimeSeries;

// ---------------------------------------------------------------------------
// Timestamp units
// ---------------------------------------------------------------------------

/// Unit of the timestamp column in a counter log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl TimeUnit {
    /// Conversion factor from this unit to seconds.
    pub fn to_seconds(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Millis => 1e-3,
            TimeUnit::Micros => 1e-6,
            TimeUnit::Nanos => 1e-9,
        }
    }
}

// ---------------------------------------------------------------------------
// FOKUS2 frequency comb
// ---------------------------------------------------------------------------

/// Load a beat measurement logged by the FOKUS2 frequency comb.
///
/// Expected layout: one free-text info line, then tab-separated rows of
/// `(timestamp in µs, frequency in Hz)`. Columns past the second are
/// ignored.
///
/// `drop_lines` lists data-row indices (0-based, not counting the info
/// line) to discard, e.g. known counter glitches.
pub fn fokus2_txt(
    path: &Path,
    session: Option<&str>,
    drop_lines: Option<&[usize]>,
) -> Result<TimeSeries> {
    let info = read_info_line(path)?;
    let mut rows = read_rows(path, 1)?;
    if let Some(drop) = drop_lines {
        if let Some(&bad) = drop.iter().find(|&&idx| idx >= rows.len()) {
            bail!("drop_lines index {bad} out of range for {} data rows", rows.len());
        }
        let mut next = 0usize;
        rows.retain(|_| {
            let keep = !drop.contains(&next);
            next += 1;
            keep
        });
    }
    let series = build_series(rows, TimeUnit::Micros, session, None)?;
    info!(
        "FOKUS2 '{info}': {} samples at {} Hz",
        series.len(),
        series.sample_rate()
    );
    Ok(series)
}

// ---------------------------------------------------------------------------
// Pendulum CNT-91 counter
// ---------------------------------------------------------------------------

/// Load a frequency measurement taken with a Pendulum CNT-91 counter.
///
/// Expected layout: one instrument info line (model, start time), then
/// tab-separated rows of `(time in s, frequency in Hz)`.
pub fn pendulum_cnt91_txt(path: &Path, session: Option<&str>) -> Result<TimeSeries> {
    let info = read_info_line(path)?;
    let rows = read_rows(path, 1)?;
    let series = build_series(rows, TimeUnit::Seconds, session, None)?;
    info!(
        "CNT-91 '{info}': {} samples at {} Hz",
        series.len(),
        series.sample_rate()
    );
    Ok(series)
}

// ---------------------------------------------------------------------------
// Generic counter
// ---------------------------------------------------------------------------

/// Load a generic two-column counter log: a single header row, then
/// tab-separated rows of `(time, frequency in Hz)` with the time column in
/// `time_unit`.
pub fn generic_freq_counter(
    path: &Path,
    session: Option<&str>,
    time_unit: TimeUnit,
    original_frequency: Option<f64>,
) -> Result<TimeSeries> {
    let rows = read_rows(path, 1)?;
    let series = build_series(rows, time_unit, session, original_frequency)?;
    info!(
        "{}: {} samples at {} Hz",
        path.display(),
        series.len(),
        series.sample_rate()
    );
    Ok(series)
}

// ---------------------------------------------------------------------------
// Shared tab-separated plumbing
// ---------------------------------------------------------------------------

/// First line of a counter file, with tabs collapsed to spaces. The
/// formats above all carry one line of instrument chatter before the data.
fn read_info_line(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .with_context(|| format!("reading info line of {}", path.display()))?;
    Ok(line.trim().replace('\t', " "))
}

/// Read tab-separated `(time, frequency)` rows, skipping `skip_rows`
/// leading lines and taking the first two columns of each record.
fn read_rows(path: &Path, skip_rows: usize) -> Result<Vec<(f64, f64)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows = Vec::new();
    for (row, result) in reader.records().enumerate() {
        if row < skip_rows {
            continue;
        }
        let record = result.with_context(|| format!("Row {row}: unreadable record"))?;
        let time = parse_field(&record, 0, row)?;
        let freq = parse_field(&record, 1, row)?;
        rows.push((time, freq));
    }
    Ok(rows)
}

fn parse_field(record: &csv::StringRecord, idx: usize, row: usize) -> Result<f64> {
    let field = record
        .get(idx)
        .with_context(|| format!("Row {row}: missing column {idx}"))?;
    field
        .parse::<f64>()
        .with_context(|| format!("Row {row}: '{field}' is not a number"))
}

/// Assemble a [`TimeSeries`] from raw `(time, frequency)` rows.
fn build_series(
    rows: Vec<(f64, f64)>,
    time_unit: TimeUnit,
    session: Option<&str>,
    original_frequency: Option<f64>,
) -> Result<TimeSeries> {
    let factor = time_unit.to_seconds();
    let timestamps: Vec<f64> = rows.iter().map(|(t, _)| t * factor).collect();
    let values: Vec<f64> = rows.iter().map(|(_, y)| *y).collect();
    let mut series = TimeSeries::new(timestamps, values)?;
    if let Some(session) = session {
        series = series.with_session(session);
    }
    if let Some(frequency) = original_frequency {
        series = series.with_original_frequency(frequency);
    }
    Ok(series)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
