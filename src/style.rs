use std::fmt;

use palette::{Hsl, IntoColor, Srgb};
use serde::{Deserialize, Serialize};

use crate::data::series::TimeSeries;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Colours in the default sequencer palette.
const PALETTE_SIZE: usize = 10;

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Srgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Srgb::new(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Line styles
// ---------------------------------------------------------------------------

/// Dash pattern distinguishing curves that share a colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl LineStyle {
    /// Fixed cycling order used by [`StyleSequencer`].
    pub const CYCLE: [LineStyle; 4] = [
        LineStyle::Solid,
        LineStyle::Dashed,
        LineStyle::Dotted,
        LineStyle::DashDot,
    ];

    /// Renderer-agnostic on/off dash lengths in points; empty means solid.
    pub fn dash_pattern(self) -> &'static [f32] {
        match self {
            LineStyle::Solid => &[],
            LineStyle::Dashed => &[6.0, 3.0],
            LineStyle::Dotted => &[1.0, 3.0],
            LineStyle::DashDot => &[6.0, 3.0, 1.0, 3.0],
        }
    }
}

impl fmt::Display for LineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineStyle::Solid => "solid",
            LineStyle::Dashed => "dashed",
            LineStyle::Dotted => "dotted",
            LineStyle::DashDot => "dashdot",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// StyleSequencer – session-grouped colour and dash assignment
// ---------------------------------------------------------------------------

/// Hands out a `(colour, line style)` pair for each curve added to a
/// figure.
///
/// Curves of one measurement session share a colour and walk through the
/// dash cycle; a new session advances to the next palette colour and
/// restarts the cycle. Both wrap around when exhausted. One sequencer per
/// figure; this is presentation state only and never feeds back into the
/// numeric engines.
#[derive(Debug, Clone)]
pub struct StyleSequencer {
    palette: Vec<Srgb<u8>>,
    session: Option<String>,
    color_idx: Option<usize>,
    dash_idx: usize,
}

impl Default for StyleSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleSequencer {
    /// Sequencer over the default ten-colour palette.
    pub fn new() -> Self {
        Self::with_palette(generate_palette(PALETTE_SIZE))
    }

    /// Sequencer over a caller-supplied palette. An empty palette falls
    /// back to the default one.
    pub fn with_palette(palette: Vec<Srgb<u8>>) -> Self {
        let palette = if palette.is_empty() {
            generate_palette(PALETTE_SIZE)
        } else {
            palette
        };
        StyleSequencer {
            palette,
            session: None,
            color_idx: None,
            dash_idx: 0,
        }
    }

    /// Style for the next curve, labelled with its session.
    pub fn next_style(&mut self, session: Option<&str>) -> (Srgb<u8>, LineStyle) {
        let same_session = self.color_idx.is_some() && self.session.as_deref() == session;
        if same_session {
            self.dash_idx = (self.dash_idx + 1) % LineStyle::CYCLE.len();
        } else {
            self.color_idx = Some(match self.color_idx {
                Some(idx) => (idx + 1) % self.palette.len(),
                None => 0,
            });
            self.dash_idx = 0;
            self.session = session.map(str::to_string);
        }
        let color = self.palette[self.color_idx.unwrap_or(0)];
        (color, LineStyle::CYCLE[self.dash_idx])
    }

    /// Forgets all cycling state, e.g. when starting a new figure.
    pub fn reset(&mut self) {
        self.session = None;
        self.color_idx = None;
        self.dash_idx = 0;
    }
}

// ---------------------------------------------------------------------------
// Series labels
// ---------------------------------------------------------------------------

/// Legend label for a series: optional session prefix, then rate and
/// duration in SI-prefixed units, e.g. `"comb vs maser: 10 Hz for 3.6 ks"`.
pub fn label(series: &TimeSeries) -> String {
    let prefix = match series.session() {
        Some(session) => format!("{session}: "),
        None => String::new(),
    };
    format!(
        "{prefix}{} for {}",
        si_format(series.sample_rate(), "Hz"),
        si_format(series.duration(), "s")
    )
}

/// Formats `value` with an SI prefix and at most three significant digits,
/// e.g. `si_format(12.0e6, "Hz")` → `"12 MHz"`.
pub fn si_format(value: f64, unit: &str) -> String {
    const PREFIXES: [&str; 9] = ["p", "n", "µ", "m", "", "k", "M", "G", "T"];
    if value == 0.0 || !value.is_finite() {
        return format!("{value} {unit}");
    }
    let magnitude = value.abs().log10().floor();
    let mut tier = ((magnitude / 3.0).floor() as i32).clamp(-4, 4);
    let mut scaled = value / 10f64.powi(3 * tier);
    // Rounding can carry the mantissa across the tier boundary; move the
    // prefix up instead of printing "1000".
    if scaled.abs().round() >= 1000.0 && tier < 4 {
        tier += 1;
        scaled = value / 10f64.powi(3 * tier);
    }
    let decimals = if scaled.abs() >= 100.0 {
        0
    } else if scaled.abs() >= 10.0 {
        1
    } else {
        2
    };
    let mut digits = format!("{scaled:.decimals$}");
    if digits.contains('.') {
        digits = digits
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string();
    }
    let prefix = PREFIXES[(tier + 4) as usize];
    format!("{digits} {prefix}{unit}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn hour_series(session: Option<&str>) -> TimeSeries {
        let timestamps: Vec<f64> = (0..3600).map(|i| i as f64).collect();
        let values = vec![1.0; 3600];
        let series = TimeSeries::new(timestamps, values).unwrap();
        match session {
            Some(session) => series.with_session(session),
            None => series,
        }
    }

    #[test]
    fn same_session_shares_colour_and_advances_dash() {
        let mut styles = StyleSequencer::new();
        let (c1, d1) = styles.next_style(Some("A"));
        let (c2, d2) = styles.next_style(Some("A"));
        let (c3, d3) = styles.next_style(Some("B"));
        assert_eq!(c1, c2);
        assert_eq!(d1, LineStyle::CYCLE[0]);
        assert_eq!(d2, LineStyle::CYCLE[1]);
        assert_ne!(c1, c3);
        assert_eq!(d3, LineStyle::CYCLE[0]);
    }

    #[test]
    fn missing_session_labels_group_together() {
        let mut styles = StyleSequencer::new();
        let (c1, d1) = styles.next_style(None);
        let (c2, d2) = styles.next_style(None);
        assert_eq!(c1, c2);
        assert_ne!(d1, d2);
    }

    #[test]
    fn dash_cycle_wraps_after_four_curves() {
        let mut styles = StyleSequencer::new();
        let first = styles.next_style(Some("A")).1;
        for _ in 0..3 {
            styles.next_style(Some("A"));
        }
        let fifth = styles.next_style(Some("A")).1;
        assert_eq!(first, fifth);
    }

    #[test]
    fn palette_wraps_after_all_colours() {
        let mut styles = StyleSequencer::with_palette(generate_palette(3));
        let c1 = styles.next_style(Some("s1")).0;
        styles.next_style(Some("s2"));
        styles.next_style(Some("s3"));
        let c4 = styles.next_style(Some("s4")).0;
        assert_eq!(c1, c4);
    }

    #[test]
    fn reset_restarts_both_cycles() {
        let mut styles = StyleSequencer::new();
        let first = styles.next_style(Some("A"));
        styles.next_style(Some("A"));
        styles.next_style(Some("B"));
        styles.reset();
        assert_eq!(styles.next_style(Some("C")), first);
    }

    #[test]
    fn dash_patterns_and_names_line_up() {
        assert!(LineStyle::Solid.dash_pattern().is_empty());
        assert_eq!(LineStyle::Dashed.dash_pattern(), &[6.0, 3.0]);
        assert_eq!(LineStyle::Dotted.to_string(), "dotted");
        assert_eq!(LineStyle::DashDot.to_string(), "dashdot");
    }

    #[test]
    fn generated_palette_has_distinct_colours() {
        let palette = generate_palette(10);
        assert_eq!(palette.len(), 10);
        for (i, a) in palette.iter().enumerate() {
            for b in palette.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn si_format_picks_prefix_and_trims_digits() {
        assert_eq!(si_format(12.0e6, "Hz"), "12 MHz");
        assert_eq!(si_format(3400.0, "s"), "3.4 ks");
        assert_eq!(si_format(1.0, "Hz"), "1 Hz");
        assert_eq!(si_format(0.25, "s"), "250 ms");
        assert_eq!(si_format(123.456, "Hz"), "123 Hz");
        assert_eq!(si_format(2.5e-6, "s"), "2.5 µs");
        assert_eq!(si_format(0.0, "Hz"), "0 Hz");
    }

    #[test]
    fn rounding_across_a_tier_boundary_bumps_the_prefix() {
        assert_eq!(si_format(999.6, "Hz"), "1 kHz");
        assert_eq!(si_format(999.4, "Hz"), "999 Hz");
        assert_eq!(si_format(999.6e-6, "s"), "1 ms");
        // No prefix above tera; the widened mantissa stays.
        assert_eq!(si_format(999.6e12, "Hz"), "1000 THz");
    }

    #[test]
    fn label_prefixes_the_session() {
        assert_eq!(label(&hour_series(None)), "1 Hz for 3.6 ks");
        assert_eq!(
            label(&hour_series(Some("comb vs maser"))),
            "comb vs maser: 1 Hz for 3.6 ks"
        );
    }
}
