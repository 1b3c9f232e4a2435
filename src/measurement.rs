use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Result;

/// Identifier of a detection channel, counted from one.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Deserialize, Serialize)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single calibration point as read from the input table
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub channel: ChannelId,
    /// Applied voltage in volts
    pub voltage: f64,
    /// Measured gain, unscaled
    pub gain: f64,
    /// Absolute uncertainty on `gain`, unscaled
    pub gain_uncertainty: f64,
}

/// Read the whitespace separated measurement table at `path`
///
/// # Errors
/// Returns an error if the file cannot be read, or if any line is malformed. No partial table is
/// returned.
pub fn read_table(path: &Path) -> Result<Vec<Measurement>> {
    let contents = fs::read_to_string(path)?;
    parse_table(&contents)
}

/// Parse a measurement table
///
/// Each non-blank line holds `channel voltage gain gain_uncertainty`. There is no header.
///
/// # Errors
/// Returns [`Error::MalformedInput`] naming the first offending line.
pub fn parse_table(contents: &str) -> Result<Vec<Measurement>> {
    let mut measurements = vec![];
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        measurements.push(parse_line(line, index + 1)?);
    }
    Ok(measurements)
}

fn parse_line(line: &str, line_number: usize) -> Result<Measurement> {
    let malformed = |reason: String| Error::MalformedInput {
        line: line_number,
        reason,
    };

    let fields = line.split_whitespace().collect::<Vec<_>>();
    if fields.len() != 4 {
        return Err(malformed(format!("expected 4 fields, found {}", fields.len())).into());
    }

    let channel = fields[0]
        .parse::<u32>()
        .map_err(|e| malformed(format!("channel `{}`: {e}", fields[0])))?;
    if channel == 0 {
        return Err(malformed("channel ids start at 1".to_owned()).into());
    }

    let mut values = [0f64; 3];
    for (value, field) in values.iter_mut().zip(&fields[1..]) {
        *value = field
            .parse::<f64>()
            .map_err(|e| malformed(format!("value `{field}`: {e}")))?;
    }
    let [voltage, gain, gain_uncertainty] = values;

    if !(voltage.is_finite() && voltage > 0.0) {
        return Err(malformed(format!("voltage must be positive, found {voltage}")).into());
    }
    if !(gain.is_finite() && gain > 0.0) {
        return Err(malformed(format!("gain must be positive, found {gain}")).into());
    }
    if !(gain_uncertainty.is_finite() && gain_uncertainty >= 0.0) {
        return Err(malformed(format!(
            "gain uncertainty must be non-negative, found {gain_uncertainty}"
        ))
        .into());
    }

    Ok(Measurement {
        channel: ChannelId(channel),
        voltage,
        gain,
        gain_uncertainty,
    })
}
