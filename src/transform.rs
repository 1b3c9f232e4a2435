use ndarray::Array1;
use serde::Serialize;

use crate::config::FitConfig;
use crate::measurement::ChannelId;
use crate::selection::ChannelDataset;

/// A calibration point in log-log space
///
/// The errors are relative errors of the untransformed quantities, which to first order are the
/// absolute errors of their logarithms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LogPoint {
    pub log_voltage: f64,
    pub log_gain: f64,
    pub log_voltage_error: f64,
    pub log_gain_error: f64,
}

impl LogPoint {
    pub fn voltage(&self) -> f64 {
        self.log_voltage.exp()
    }

    /// Recover the unscaled gain
    pub fn gain(&self, gain_scale: f64) -> f64 {
        self.log_gain.exp() / gain_scale
    }
}

/// A calibration point on linear axes, with the gain already multiplied by the gain scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LinearPoint {
    pub voltage: f64,
    pub gain: f64,
    pub voltage_error: f64,
    pub gain_error: f64,
}

/// Both representations of one channel's data, index aligned and in input order
#[derive(Clone, Debug, PartialEq)]
pub struct TransformedDataset {
    pub channel: ChannelId,
    pub log: Vec<LogPoint>,
    pub linear: Vec<LinearPoint>,
}

/// Columns of the log-space data, in the layout the minimiser consumes
pub(crate) struct LogColumns {
    pub(crate) x: Array1<f64>,
    pub(crate) y: Array1<f64>,
    pub(crate) x_error: Array1<f64>,
    pub(crate) y_error: Array1<f64>,
}

/// Map a validated channel dataset into log-log space, keeping the linear-scale copy
pub fn transform(dataset: &ChannelDataset, config: &FitConfig) -> TransformedDataset {
    let linear = dataset
        .measurements
        .iter()
        .map(|measurement| LinearPoint {
            voltage: measurement.voltage,
            gain: measurement.gain * config.gain_scale,
            voltage_error: config.voltage_uncertainty,
            gain_error: measurement.gain_uncertainty * config.gain_scale,
        })
        .collect::<Vec<_>>();

    let log = linear
        .iter()
        .map(|point| LogPoint {
            log_voltage: point.voltage.ln(),
            log_gain: point.gain.ln(),
            log_voltage_error: point.voltage_error / point.voltage,
            log_gain_error: point.gain_error / point.gain,
        })
        .collect();

    TransformedDataset {
        channel: dataset.channel,
        log,
        linear,
    }
}

impl TransformedDataset {
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub(crate) fn log_columns(&self) -> LogColumns {
        LogColumns {
            x: self.log.iter().map(|p| p.log_voltage).collect(),
            y: self.log.iter().map(|p| p.log_gain).collect(),
            x_error: self.log.iter().map(|p| p.log_voltage_error).collect(),
            y_error: self.log.iter().map(|p| p.log_gain_error).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::config::FitConfig;
    use crate::measurement::{ChannelId, Measurement};
    use crate::selection::ChannelDataset;

    use super::transform;

    fn dataset(points: &[(f64, f64, f64)]) -> ChannelDataset {
        ChannelDataset {
            channel: ChannelId(1),
            measurements: points
                .iter()
                .map(|&(voltage, gain, gain_uncertainty)| Measurement {
                    channel: ChannelId(1),
                    voltage,
                    gain,
                    gain_uncertainty,
                })
                .collect(),
        }
    }

    #[test]
    fn errors_are_propagated_as_relative_errors() {
        let config = FitConfig::default();
        let transformed = transform(&dataset(&[(1000., 0.5, 0.02), (1500., 2., 0.1)]), &config);

        assert_eq!(transformed.len(), 2);
        let first = transformed.log[0];
        approx::assert_relative_eq!(first.log_voltage, 1000f64.ln());
        approx::assert_relative_eq!(first.log_gain, (0.5 * 1e7f64).ln());
        approx::assert_relative_eq!(first.log_voltage_error, 2. / 1000.);
        approx::assert_relative_eq!(first.log_gain_error, 0.04);

        let second = transformed.linear[1];
        approx::assert_relative_eq!(second.voltage, 1500.);
        approx::assert_relative_eq!(second.gain, 2e7);
        approx::assert_relative_eq!(second.voltage_error, 2.);
        approx::assert_relative_eq!(second.gain_error, 1e6);
    }

    #[test]
    fn point_order_is_preserved() {
        let config = FitConfig::default();
        let transformed = transform(
            &dataset(&[(1800., 1., 0.1), (1000., 1., 0.1), (1400., 1., 0.1)]),
            &config,
        );
        let voltages = transformed
            .linear
            .iter()
            .map(|p| p.voltage)
            .collect::<Vec<_>>();
        assert_eq!(voltages, vec![1800., 1000., 1400.]);
    }

    proptest! {
        #[test]
        fn log_transform_round_trips(
            voltage in 1.0f64..1e5,
            gain in 1e-12f64..1e3,
            relative_error in 0.0f64..0.5,
        ) {
            let config = FitConfig::default();
            let transformed = transform(&dataset(&[(voltage, gain, gain * relative_error)]), &config);
            let point = transformed.log[0];

            prop_assert!(approx::relative_eq!(point.voltage(), voltage, max_relative = 1e-12));
            prop_assert!(approx::relative_eq!(point.gain(config.gain_scale), gain, max_relative = 1e-12));
            prop_assert!(approx::relative_eq!(point.log_gain_error, relative_error, max_relative = 1e-12, epsilon = 1e-15));
        }
    }
}
