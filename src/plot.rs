//! Data handed to the figure renderer
//!
//! Each fitted channel is drawn twice: the log-log points with the fitted straight line, and the
//! linear-scale points with the power-law curve over the fit domain. Rendering itself happens
//! elsewhere; this module only assembles and exports the numbers.
use std::io;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::fit::{FitResult, PowerLaw};
use crate::measurement::ChannelId;
use crate::report::Report;
use crate::transform::{LinearPoint, LogPoint, TransformedDataset};
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

/// Everything needed to draw the two panels of one channel's figure
#[derive(Clone, Debug, PartialEq)]
pub struct PlotData {
    pub channel: ChannelId,
    pub log_points: Vec<LogPoint>,
    pub linear_points: Vec<LinearPoint>,
    /// The fitted line in log-log space, across the measured voltages
    pub log_line: Vec<CurvePoint>,
    /// The power law on linear axes, across the fit domain
    pub power_law_curve: Vec<CurvePoint>,
    pub fit: FitResult,
    pub power_law: PowerLaw,
}

impl PlotData {
    pub fn new(data: &TransformedDataset, fit: &FitResult, config: &Config) -> Self {
        let power_law = fit.power_law(config.fit.gain_scale);
        let samples = config.curve_samples.max(2);

        let (low, high) = data
            .log
            .iter()
            .map(|point| point.log_voltage)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            });
        let log_line = Array1::linspace(low, high, samples)
            .into_iter()
            .map(|x| CurvePoint {
                x,
                y: fit.constant + fit.exponent * x,
            })
            .collect();

        let domain = config.fit.fit_domain;
        let power_law_curve = Array1::linspace(domain.low, domain.high, samples)
            .into_iter()
            .map(|voltage| CurvePoint {
                x: voltage,
                y: power_law.scaled_gain(voltage),
            })
            .collect();

        Self {
            channel: data.channel,
            log_points: data.log.clone(),
            linear_points: data.linear.clone(),
            log_line,
            power_law_curve,
            fit: *fit,
            power_law,
        }
    }

    /// Write all series as one long-format CSV table with a header
    ///
    /// # Errors
    /// Returns an error if writing to `writer` fails.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        for point in &self.log_points {
            wtr.serialize(PlotRow {
                series: Series::LogData,
                x: point.log_voltage,
                y: point.log_gain,
                x_error: point.log_voltage_error,
                y_error: point.log_gain_error,
            })?;
        }
        for point in &self.linear_points {
            wtr.serialize(PlotRow {
                series: Series::LinearData,
                x: point.voltage,
                y: point.gain,
                x_error: point.voltage_error,
                y_error: point.gain_error,
            })?;
        }
        for (series, curve) in [
            (Series::LogFit, &self.log_line),
            (Series::LinearFit, &self.power_law_curve),
        ] {
            for point in curve {
                wtr.serialize(PlotRow {
                    series,
                    x: point.x,
                    y: point.y,
                    x_error: 0.,
                    y_error: 0.,
                })?;
            }
        }

        wtr.flush()?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Series {
    LogData,
    LinearData,
    LogFit,
    LinearFit,
}

#[derive(Serialize)]
struct PlotRow {
    series: Series,
    x: f64,
    y: f64,
    x_error: f64,
    y_error: f64,
}

/// Fit parameters of every channel whose fit ran, for archiving alongside the figures
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Archive {
    pub channels: Vec<ArchiveEntry>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ArchiveEntry {
    pub channel: ChannelId,
    /// `exp(constant)`, in scaled gain units
    pub amplitude: f64,
    /// Amplitude in the units of the input table
    pub unscaled_amplitude: f64,
    pub fit: FitResult,
}

impl Archive {
    pub fn from_report(report: &Report, gain_scale: f64) -> Self {
        let channels = report
            .fits()
            .map(|fit| {
                let power_law = fit.power_law(gain_scale);
                ArchiveEntry {
                    channel: fit.channel,
                    amplitude: power_law.amplitude,
                    unscaled_amplitude: power_law.unscaled_amplitude(),
                    fit: *fit,
                }
            })
            .collect();
        Self { channels }
    }

    /// # Errors
    /// Returns an error if the archive cannot be serialised.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}
