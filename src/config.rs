use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Settings for a calibration run
///
/// Every field has a default, so a configuration file only needs to name the values it changes.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Channels `1..=num_channels` are analysed
    pub num_channels: u32,
    /// Number of points on each sampled curve handed to the renderer
    pub curve_samples: usize,
    pub fit: FitConfig,
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_channels: 10,
            curve_samples: 100,
            fit: FitConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not deserialize into a [`Config`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which no channel could ever be fitted
    ///
    /// # Errors
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.num_channels == 0 {
            return Err("num_channels must be at least 1".into());
        }
        if !(self.fit.fit_domain.low > 0.0 && self.fit.fit_domain.low < self.fit.fit_domain.high) {
            return Err(format!(
                "fit domain must satisfy 0 < low < high, found {:?}",
                self.fit.fit_domain
            )
            .into());
        }
        if !(self.fit.gain_scale.is_finite() && self.fit.gain_scale > 0.0) {
            return Err("gain_scale must be positive".into());
        }
        if !(self.fit.voltage_uncertainty.is_finite() && self.fit.voltage_uncertainty >= 0.0) {
            return Err("voltage_uncertainty must be non-negative".into());
        }
        if self.fit.valid_dataset_sizes.iter().any(|&size| size < 2) {
            return Err("valid dataset sizes must leave at least two points to fit".into());
        }
        Ok(())
    }
}

/// Parameters of the power-law fit
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FitConfig {
    /// Absolute uncertainty attached to every voltage, in volts
    pub voltage_uncertainty: f64,
    /// Factor applied to gains and their uncertainties before fitting
    pub gain_scale: f64,
    /// Number of re-seeded fits run after the initial one
    pub refinement_passes: usize,
    /// Channels with any other number of points are skipped
    pub valid_dataset_sizes: Vec<usize>,
    /// Iteration cap for a single minimiser run
    pub max_iters: u64,
    /// Stop refining once neither parameter moves by more than this between passes.
    ///
    /// When unset every refinement pass is run.
    pub convergence_tolerance: Option<f64>,
    /// Voltage range over which the fitted curve is evaluated
    pub fit_domain: FitDomain,
    /// Starting parameters of the first pass
    pub seed: Seed,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            voltage_uncertainty: 2.,
            gain_scale: 1e7,
            refinement_passes: 9,
            valid_dataset_sizes: vec![3, 6],
            max_iters: 100,
            convergence_tolerance: None,
            fit_domain: FitDomain {
                low: 1000.,
                high: 2000.,
            },
            seed: Seed {
                constant: -30.,
                exponent: 7.,
            },
        }
    }
}

impl FitConfig {
    pub fn accepts(&self, size: usize) -> bool {
        self.valid_dataset_sizes.contains(&size)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct FitDomain {
    pub low: f64,
    pub high: f64,
}

impl FitDomain {
    pub fn contains(&self, voltage: f64) -> bool {
        (self.low..=self.high).contains(&voltage)
    }
}

/// Line parameters in log-log space, `ln(gain) = constant + exponent * ln(voltage)`
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Seed {
    pub constant: f64,
    pub exponent: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Write a third placeholder row for skipped channels so every channel spans three rows
    pub pad_skipped_channels: bool,
}
