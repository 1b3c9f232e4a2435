use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::config::{FitConfig, Seed};
use crate::math::chi_square_survival;
use crate::measurement::ChannelId;
use crate::minimisation::Problem;
use crate::transform::TransformedDataset;
use crate::Result;

/// Number of parameters of the line fitted in log-log space
const NUM_PARAMETERS: usize = 2;

/// Outcome of the power-law fit for one channel
///
/// `constant` and `exponent` describe the line `ln(gain * gain_scale) = constant + exponent *
/// ln(voltage)`, so the fitted relation on linear axes is `gain * gain_scale = exp(constant) *
/// voltage^exponent`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct FitResult {
    pub channel: ChannelId,
    pub constant: f64,
    pub constant_stderr: f64,
    pub exponent: f64,
    pub exponent_stderr: f64,
    pub chi_square: f64,
    pub ndf: usize,
    pub p_value: f64,
}

impl FitResult {
    /// True if every reported quantity is a finite number
    pub fn is_finite(&self) -> bool {
        [
            self.constant,
            self.constant_stderr,
            self.exponent,
            self.exponent_stderr,
            self.chi_square,
            self.p_value,
        ]
        .iter()
        .all(|value| value.is_finite())
    }

    pub fn power_law(&self, gain_scale: f64) -> PowerLaw {
        PowerLaw {
            amplitude: self.constant.exp(),
            exponent: self.exponent,
            gain_scale,
        }
    }
}

/// The fitted relation on linear axes, `gain * gain_scale = amplitude * voltage^exponent`
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct PowerLaw {
    /// Amplitude in scaled gain units, `exp(constant)`
    pub amplitude: f64,
    pub exponent: f64,
    pub gain_scale: f64,
}

impl PowerLaw {
    /// Scaled gain at `voltage`, matching the linear-scale display of the data
    pub fn scaled_gain(&self, voltage: f64) -> f64 {
        self.amplitude * voltage.powf(self.exponent)
    }

    /// Gain at `voltage` in the units of the input table
    pub fn gain(&self, voltage: f64) -> f64 {
        self.scaled_gain(voltage) / self.gain_scale
    }

    /// Amplitude in the units of the input table
    pub fn unscaled_amplitude(&self) -> f64 {
        self.amplitude / self.gain_scale
    }
}

/// Iterative weighted power-law fitter
///
/// The line is first fitted from the configured seed, then refitted `refinement_passes` times,
/// each pass starting from the parameters of the one before.
pub struct Fitter<'a> {
    config: &'a FitConfig,
}

impl<'a> Fitter<'a> {
    pub const fn new(config: &'a FitConfig) -> Self {
        Self { config }
    }

    /// Fit one validated channel
    ///
    /// Non-finite results are returned as they are; callers decide how to treat them.
    ///
    /// # Errors
    /// Returns an error if the dataset has fewer points than parameters, or if the minimiser
    /// itself fails, for example on a singular normal matrix.
    pub fn fit(&self, data: &TransformedDataset) -> Result<FitResult> {
        if data.len() < NUM_PARAMETERS {
            return Err(format!(
                "channel {} has {} points, at least {NUM_PARAMETERS} are needed",
                data.channel,
                data.len()
            )
            .into());
        }

        let problem = Problem::from(data.log_columns());
        let Seed { constant, exponent } = self.config.seed;

        let mut params = self.single_pass(&problem, [constant, exponent])?;
        for pass in 1..=self.config.refinement_passes {
            let refined = self.single_pass(&problem, [params[0], params[1]])?;
            log::debug!(
                "channel {} pass {pass}: constant = {}, exponent = {}",
                data.channel,
                refined[0],
                refined[1]
            );

            let shift = (&refined - &params).mapv(f64::abs);
            params = refined;

            if let Some(tolerance) = self.config.convergence_tolerance {
                if shift.iter().all(|&delta| delta < tolerance) {
                    log::debug!("channel {} converged after {pass} refinement passes", data.channel);
                    break;
                }
            }
        }

        summarise(data.channel, &problem, &params)
    }

    fn single_pass(&self, problem: &Problem, seed: [f64; 2]) -> Result<Array1<f64>> {
        problem.clone().solve(seed, self.config.max_iters)
    }
}

fn summarise(channel: ChannelId, problem: &Problem, params: &Array1<f64>) -> Result<FitResult> {
    let covariance = problem.covariance(params)?;
    let chi_square = problem.chi_square(params);
    let ndf = problem.len() - NUM_PARAMETERS;

    Ok(FitResult {
        channel,
        constant: params[0],
        constant_stderr: covariance[[0, 0]].sqrt(),
        exponent: params[1],
        exponent_stderr: covariance[[1, 1]].sqrt(),
        chi_square,
        ndf,
        p_value: chi_square_survival(chi_square, ndf),
    })
}
