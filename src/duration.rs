/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use phf::phf_map;
use std::{error::Error, fmt};

/// Units a scheduler log may attach to a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Microsecond,
    Millisecond,
    Second,
}

static UNITS: phf::Map<&'static str, Unit> = phf_map! {
    "µs" => Unit::Microsecond,
    "ms" => Unit::Millisecond,
    "s" => Unit::Second,
};

impl Unit {
    pub fn try_from_suffix(suffix: &str) -> Result<Unit, DurationError> {
        UNITS
            .get(suffix)
            .copied()
            .ok_or_else(|| DurationError::UnknownUnit(suffix.to_string()))
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Microsecond => "µs",
            Unit::Millisecond => "ms",
            Unit::Second => "s",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DurationError {
    /// The unit is not one of µs, ms or s. Reaching this from the log extractor means the
    /// tokenizer let an unvalidated unit through.
    UnknownUnit(String),
    InvalidMagnitude(String),
}
impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DurationError::UnknownUnit(unit) => write!(f, "Unknown time unit: {}", unit),
            DurationError::InvalidMagnitude(value) => write!(f, "Invalid duration value: {}", value),
        }
    }
}
impl Error for DurationError {}

/// A duration as it appears in a log line, before canonicalisation.
///
/// `minutes` is only ever set for second-valued durations written as `<int>m<float>`, which is
/// how Go formats anything longer than a minute (`1m31.17s`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationValue {
    pub magnitude: f64,
    pub unit: Unit,
    pub minutes: Option<u64>,
}
impl DurationValue {
    pub fn parse(value: &str, unit: &str) -> Result<DurationValue, DurationError> {
        let unit = Unit::try_from_suffix(unit)?;
        let invalid = || DurationError::InvalidMagnitude(value.to_string());

        // the minute marker has to be checked before the plain-second rule
        let duration = match value.split_once('m') {
            Some((mins, secs)) if unit == Unit::Second => DurationValue {
                magnitude: parse_magnitude(secs).ok_or_else(invalid)?,
                unit,
                minutes: Some(mins.parse::<u64>().map_err(|_| invalid())?),
            },
            _ => DurationValue {
                magnitude: parse_magnitude(value).ok_or_else(invalid)?,
                unit,
                minutes: None,
            },
        };

        // a finite magnitude can still overflow once scaled to milliseconds
        if !duration.as_millis().is_finite() {
            return Err(invalid());
        }
        Ok(duration)
    }

    /// Canonical value in milliseconds. Never negative.
    pub fn as_millis(&self) -> f64 {
        match (self.unit, self.minutes) {
            (Unit::Second, Some(mins)) => mins as f64 * 60.0 * 1000.0 + self.magnitude * 1000.0,
            (Unit::Second, None) => self.magnitude * 1000.0,
            (Unit::Millisecond, _) => self.magnitude,
            (Unit::Microsecond, _) => self.magnitude / 1000.0,
        }
    }
}

/// Converts a numeric string and unit suffix into milliseconds.
///
/// # Arguments
/// * value - the numeric part, e.g. `1500`, `12.3` or `1m30.5` (seconds only)
/// * unit - one of `µs`, `ms` or `s`
///
/// # Returns
/// The duration in milliseconds or a `DurationError::UnknownUnit` for any other unit.
pub fn to_milliseconds(value: &str, unit: &str) -> Result<f64, DurationError> {
    DurationValue::parse(value, unit).map(|d| d.as_millis())
}

// Only plain decimal digits are accepted, so "inf", "-1" and "1e3" are rejected. Digit strings
// too long for an f64 overflow to infinity and are rejected as well.
fn parse_magnitude(text: &str) -> Option<f64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
