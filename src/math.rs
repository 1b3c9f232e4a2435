use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Probability that a chi-square variable with `ndf` degrees of freedom exceeds `chi_square`
///
/// Follows the usual fitting conventions: with no degrees of freedom the probability is zero, and
/// a vanishing chi-square has probability one.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn chi_square_survival(chi_square: f64, ndf: usize) -> f64 {
    if chi_square.is_nan() {
        return f64::NAN;
    }
    if ndf == 0 || chi_square < 0. {
        return 0.;
    }
    if chi_square == 0. {
        return 1.;
    }
    ChiSquared::new(ndf as f64).map_or(f64::NAN, |distribution| distribution.sf(chi_square))
}
