//! Parsing and formatting of the free-text numeric fields.
//!
//! Sessions keep human-readable display strings as their canonical
//! representation (`"40 min"`, `"RPE 7.5"`). This module holds the only
//! parse/format rules for those strings so round-tripping stays exact:
//! - first embedded integer extraction (durations, day volumes)
//! - RPE token extraction and re-serialization

use once_cell::sync::Lazy;
use regex::Regex;

static FIRST_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static RPE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"RPE\s*(\d+(\.\d+)?)").unwrap());

/// Extract the first integer embedded in free text.
///
/// `"40 min"` -> `Some(40)`, `"unos 15-20 min"` -> `Some(15)`,
/// `"moderada"` -> `None`.
pub fn first_integer(text: &str) -> Option<i64> {
    FIRST_INT.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Parse a duration string into minutes; unparsable text yields 0.
pub fn duration_minutes(text: &str) -> f64 {
    first_integer(text).unwrap_or(0) as f64
}

/// Serialize a minutes value back to its display form.
///
/// Integral values render without a decimal part: `40.0` -> `"40 min"`.
pub fn format_minutes(minutes: f64) -> String {
    if minutes.fract() == 0.0 {
        format!("{} min", minutes as i64)
    } else {
        format!("{} min", minutes)
    }
}

/// Extract the RPE numeral from an intensity string, if present.
///
/// Matches the `RPE <number>` token: `"Alta - RPE 8"` -> `Some(8.0)`.
pub fn extract_rpe(text: &str) -> Option<f64> {
    RPE_TOKEN
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Serialize an RPE value to its display form, one decimal place.
pub fn format_rpe(rpe: f64) -> String {
    format!("RPE {:.1}", rpe)
}

/// Round to one decimal place (RPE arithmetic precision).
pub fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
