use argmin::core::{Executor, Jacobian, Operator, State};
use argmin::solver::gaussnewton::GaussNewton;
use ndarray::{s, Array1, Array2};
use ndarray_linalg::Inverse;

use crate::transform::LogColumns;
use crate::Result;

/// Straight line fit with uncertainties on both axes
///
/// The residual of point `i` for parameters `[constant, slope]` is
/// $$
///     r_i = \frac{constant + slope\, x_i - y_i}{\sqrt{\sigma_{y,i}^2 + slope^2 \sigma_{x,i}^2}}
/// $$
/// so the error on `x` is projected onto the `y` axis through the slope of the line. The sum of
/// the squared residuals is the effective-variance chi-square, which is minimised here in the
/// least squares sense.
#[derive(Clone, Debug)]
pub(crate) struct Problem {
    x: Array1<f64>,
    y: Array1<f64>,
    x_error: Array1<f64>,
    y_error: Array1<f64>,
}

impl From<LogColumns> for Problem {
    fn from(columns: LogColumns) -> Self {
        Self {
            x: columns.x,
            y: columns.y,
            x_error: columns.x_error,
            y_error: columns.y_error,
        }
    }
}

impl Problem {
    pub(crate) fn len(&self) -> usize {
        self.x.len()
    }

    /// The combined uncertainty of each point for a line of gradient `slope`
    fn effective_error(&self, slope: f64) -> Array1<f64> {
        (self.y_error.mapv(|e| e.powi(2)) + self.x_error.mapv(|e| (slope * e).powi(2)))
            .mapv(f64::sqrt)
    }

    fn residuals(&self, params: &Array1<f64>) -> Array1<f64> {
        let (constant, slope) = (params[0], params[1]);
        (self.x.mapv(|x| constant + slope * x) - &self.y) / self.effective_error(slope)
    }

    fn jacobian_matrix(&self, params: &Array1<f64>) -> Array2<f64> {
        let (constant, slope) = (params[0], params[1]);
        let sigma = self.effective_error(slope);
        let deviation = self.x.mapv(|x| constant + slope * x) - &self.y;

        let mut jacobian = Array2::zeros((self.len(), 2));
        jacobian.slice_mut(s![.., 0]).assign(&sigma.mapv(|s| 1. / s));
        // The slope enters both the numerator and the effective error
        let d_slope = &self.x / &sigma
            - &deviation * &self.x_error.mapv(|e| slope * e.powi(2)) / sigma.mapv(|s| s.powi(3));
        jacobian.slice_mut(s![.., 1]).assign(&d_slope);
        jacobian
    }

    /// The effective-variance chi-square at `params`
    pub(crate) fn chi_square(&self, params: &Array1<f64>) -> f64 {
        let residuals = self.residuals(params);
        residuals.dot(&residuals)
    }

    /// Parameter covariance at `params`, from the inverse of the approximate Hessian `JᵀJ`
    pub(crate) fn covariance(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let jacobian = self.jacobian_matrix(params);
        let curvature = jacobian.t().dot(&jacobian);
        Ok(curvature.inv()?)
    }

    /// Run a single minimisation from `initial_parameters`
    ///
    /// Returns whatever parameters the solver holds when it stops, converged or not.
    pub(crate) fn solve(self, initial_parameters: [f64; 2], max_iters: u64) -> Result<Array1<f64>> {
        let initial_parameters = Array1::from(initial_parameters.to_vec());
        let solver = GaussNewton::new().with_tolerance(f64::EPSILON.sqrt())?;

        let res = Executor::new(self, solver)
            .configure(|state| state.param(initial_parameters).max_iters(max_iters))
            .run()?;

        let mut state = res.state().clone();
        log::trace!("minimiser stopped after {} iterations", state.get_iter());
        state
            .take_param()
            .ok_or_else(|| "minimiser returned no parameters".into())
    }
}

impl Operator for Problem {
    type Param = Array1<f64>;
    type Output = Array1<f64>;

    fn apply(&self, p: &Self::Param) -> ::std::result::Result<Self::Output, argmin::core::Error> {
        Ok(self.residuals(p))
    }
}

impl Jacobian for Problem {
    type Param = Array1<f64>;
    type Jacobian = Array2<f64>;

    fn jacobian(
        &self,
        p: &Self::Param,
    ) -> ::std::result::Result<Self::Jacobian, argmin::core::Error> {
        Ok(self.jacobian_matrix(p))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array1};
    use ndarray_rand::rand::{Rng, SeedableRng};
    use rand_isaac::Isaac64Rng;

    use crate::Result;

    use super::Problem;

    fn straight_line(rng: &mut impl Rng, constant: f64, slope: f64, num_points: usize) -> Problem {
        let x = Array1::from_iter((0..num_points).map(|_| rng.gen_range(6.5..7.8)));
        let y = x.mapv(|x| constant + slope * x);
        Problem {
            x_error: x.mapv(|_| rng.gen_range(1e-3..1e-2)),
            y_error: y.mapv(|_| rng.gen_range(1e-3..5e-2)),
            x,
            y,
        }
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);

        let mut problem = straight_line(&mut rng, -1.6, 7., 6);
        // Move the data off the line so the effective error term contributes
        problem.y = problem.y.mapv(|y| y + rng.gen_range(-0.1..0.1));
        let params = array![rng.gen_range(-3.0..0.0), rng.gen_range(5.0..9.0)];

        let computed = problem.jacobian_matrix(&params);
        let delta_rel = 1e-6;

        for jj in 0..2 {
            let delta = params[jj] * delta_rel;
            let mut plus = params.clone();
            plus[jj] += delta;
            let mut minus = params.clone();
            minus[jj] -= delta;

            let numerical = (problem.residuals(&plus) - problem.residuals(&minus)) / (2. * delta);

            for (comp, num) in computed.column(jj).iter().zip(numerical) {
                approx::assert_relative_eq!(*comp, num, max_relative = 1e-5, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn exact_line_is_recovered_from_a_distant_start() -> Result<()> {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);

        let constant = -1.609;
        let slope = 7.;
        let problem = straight_line(&mut rng, constant, slope, 6);

        let solution = problem.clone().solve([-30., 7.], 100)?;

        approx::assert_relative_eq!(solution[0], constant, max_relative = 1e-6);
        approx::assert_relative_eq!(solution[1], slope, max_relative = 1e-6);
        approx::assert_abs_diff_eq!(problem.chi_square(&solution), 0., epsilon = 1e-10);
        Ok(())
    }

    #[test]
    fn reseeding_at_the_solution_leaves_it_in_place() -> Result<()> {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);

        let mut problem = straight_line(&mut rng, -1.6, 7., 3);
        problem.y = problem.y.mapv(|y| y + rng.gen_range(-0.05..0.05));

        let first = problem.clone().solve([-30., 7.], 100)?;
        let second = problem.clone().solve([first[0], first[1]], 100)?;

        assert_eq!(second.len(), 2);
        approx::assert_relative_eq!(first[0], second[0], max_relative = 1e-8);
        approx::assert_relative_eq!(first[1], second[1], max_relative = 1e-8);
        Ok(())
    }

    #[test]
    fn covariance_reduces_to_weighted_least_squares_without_abscissa_errors() -> Result<()> {
        let problem = Problem {
            x: array![1., 2., 3., 4.],
            y: array![2.1, 3.9, 6.2, 7.8],
            x_error: array![0., 0., 0., 0.],
            y_error: array![0.1, 0.2, 0.1, 0.2],
        };

        let solution = problem.clone().solve([0., 1.], 100)?;
        let covariance = problem.covariance(&solution)?;

        // Closed form weighted least squares
        let w = problem.y_error.mapv(|e| e.powi(-2));
        let s = w.sum();
        let sx = w.dot(&problem.x);
        let sy = w.dot(&problem.y);
        let sxx = w.dot(&problem.x.mapv(|x| x * x));
        let sxy = w.dot(&(&problem.x * &problem.y));
        let determinant = s * sxx - sx * sx;

        approx::assert_relative_eq!(solution[0], (sxx * sy - sx * sxy) / determinant, max_relative = 1e-8);
        approx::assert_relative_eq!(solution[1], (s * sxy - sx * sy) / determinant, max_relative = 1e-8);
        approx::assert_relative_eq!(covariance[[0, 0]], sxx / determinant, max_relative = 1e-8);
        approx::assert_relative_eq!(covariance[[1, 1]], s / determinant, max_relative = 1e-8);
        approx::assert_relative_eq!(covariance[[0, 1]], -sx / determinant, max_relative = 1e-8);
        Ok(())
    }
}
