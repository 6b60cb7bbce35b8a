use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use tracing::debug;

use crate::config::{NumericsConfig, TypeDistribution};
use crate::error::ModelError;
use crate::minimize::{self, NelderMeadOptions};
use crate::normal;
use crate::types::ConsumerType;

/// Mean and standard deviation of `max(X, 0)` for `X ~ Normal(m, s)`.
pub fn clipped_normal_moments(m: f64, s: f64) -> (f64, f64) {
    let alpha = -m / s;
    // Probability the draw is clipped, and its complement computed directly
    // so neither loses precision in the tails.
    let clipped = normal::cdf(alpha);
    let kept = normal::cdf(-alpha);
    let phi = normal::pdf(alpha);

    let mean = kept * m + s * phi;
    if kept <= 0.0 {
        return (mean.max(0.0), 0.0);
    }
    let mills = phi / kept;
    let variance =
        s * s * kept * (1.0 - mills * mills + mills * alpha + (alpha - mills).powi(2) * clipped);
    (mean, variance.max(0.0).sqrt())
}

/// Solved loss parameters for one target pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossCalibration {
    pub m: f64,
    pub s: f64,
    /// Sum of relative moment residuals at the solution.
    pub residual: f64,
    pub iterations: usize,
}

/// Find `(M, S)` such that the normal loss clipped at zero has mean `m_real`
/// and standard deviation `s_real`, with `M` in `[0, m_real]` and
/// `S >= s_real`.
///
/// The search runs in units of the targets and minimises the sum of absolute
/// relative residuals from several starts, the first one fitted to the target
/// std/mean ratio. Fails with `TypeCalibration` when the best point found
/// misses by more than `numerics.calibration_tolerance`.
pub fn calibrate_loss(
    m_real: f64,
    s_real: f64,
    numerics: &NumericsConfig,
) -> Result<LossCalibration, ModelError> {
    if !(m_real.is_finite() && m_real > 0.0 && s_real.is_finite() && s_real > 0.0) {
        return Err(ModelError::InvalidType {
            reason: format!("loss targets must be finite and positive, got ({m_real}, {s_real})"),
        });
    }

    let residual = |x: &[f64; 2]| {
        let (mean, sd) = clipped_normal_moments(x[0] * m_real, x[1] * s_real);
        (mean / m_real - 1.0).abs() + (sd / s_real - 1.0).abs()
    };
    let options = NelderMeadOptions {
        max_iterations: numerics.calibration_max_iterations,
        max_restarts: numerics.calibration_max_restarts,
        target: numerics.calibration_tolerance * 1e-3,
        ..NelderMeadOptions::default()
    };
    let starts = [ratio_matched_start(m_real, s_real), [1.0, 1.0], [0.5, 1.25], [0.1, 1.6]];
    let Some(best) =
        minimize::nelder_mead_multistart(residual, &starts, &[0.0, 1.0], &[1.0, f64::INFINITY], &options)
    else {
        return Err(ModelError::TypeCalibration {
            m_real,
            s_real,
            residual: f64::INFINITY,
            iterations: 0,
        });
    };

    let calibration = LossCalibration {
        m: best.x[0] * m_real,
        s: best.x[1] * s_real,
        residual: best.value,
        iterations: best.iterations,
    };
    debug!(
        m_real,
        s_real,
        m = calibration.m,
        s = calibration.s,
        residual = calibration.residual,
        iterations = calibration.iterations,
        restarts = best.restarts,
        "calibrated loss distribution"
    );

    if !(calibration.residual <= numerics.calibration_tolerance) {
        return Err(ModelError::TypeCalibration {
            m_real,
            s_real,
            residual: calibration.residual,
            iterations: calibration.iterations,
        });
    }
    Ok(calibration)
}

/// Scaled start on the one-parameter family whose std/mean ratio matches the
/// targets. The ratio depends on `M/S` alone and falls monotonically, so a
/// line search pins `M/S` and the mean fixes the scale.
fn ratio_matched_start(m_real: f64, s_real: f64) -> [f64; 2] {
    let ratio = s_real / m_real;
    let upper = 2.0 / ratio + 10.0;
    let t = minimize::golden_section(
        |t| {
            let (mean, sd) = clipped_normal_moments(t, 1.0);
            (sd / mean - ratio).abs()
        },
        0.0,
        upper,
        1e-12 * upper,
    );
    let (mean, _) = clipped_normal_moments(t, 1.0);
    let s = m_real / mean;
    [t * s / m_real, s / s_real]
}

/// Lower-triangular `L` with `L·Lᵀ = a`, tolerating positive semi-definite
/// input: a pivot that vanishes (to rounding) zeroes its column.
pub fn cholesky_psd<const N: usize>(a: &[[f64; N]; N]) -> Result<[[f64; N]; N], ModelError> {
    let scale = (0..N).map(|i| a[i][i].abs()).fold(0.0, f64::max).max(f64::MIN_POSITIVE);
    let tolerance = 1e-12 * scale;
    let mut l = [[0.0; N]; N];

    for i in 0..N {
        for j in 0..=i {
            if (a[i][j] - a[j][i]).abs() > tolerance {
                return Err(ModelError::InvalidConfig(format!(
                    "covariance is not symmetric at ({i}, {j})"
                )));
            }
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum < -tolerance {
                    return Err(ModelError::InvalidConfig(format!(
                        "covariance is not positive semi-definite (pivot {i} = {sum})"
                    )));
                }
                l[i][i] = if sum > tolerance { sum.sqrt() } else { 0.0 };
            } else {
                let ljj = l[j][j];
                l[i][j] = if ljj > 0.0 { sum / ljj } else { 0.0 };
            }
        }
    }
    Ok(l)
}

/// Draws consumer types: lognormal primitives, then calibrated loss parameters.
#[derive(Debug, Clone)]
pub struct TypeSampler {
    /// Means of the underlying normal, shifted so the lognormal hits the target means.
    log_mean: [f64; 4],
    /// Square root `R` of the log covariance with `Rᵀ·R = Σ`; a draw is `z·R`.
    root: [[f64; 4]; 4],
    numerics: NumericsConfig,
}

impl TypeSampler {
    pub fn new(
        distribution: &TypeDistribution,
        numerics: &NumericsConfig,
    ) -> Result<Self, ModelError> {
        let mean = distribution.mean;
        if mean.iter().any(|m| !m.is_finite()) || mean[0] < 0.0 || mean[1] < 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "type means must be finite and non-negative, got {mean:?}"
            )));
        }
        if !(mean[2] > 0.0 && mean[3] > 0.0) {
            return Err(ModelError::InvalidConfig(format!(
                "loss mean and std targets must be positive, got {mean:?}"
            )));
        }

        let lower = cholesky_psd(&distribution.log_covariance)?;
        let root: [[f64; 4]; 4] = std::array::from_fn(|i| std::array::from_fn(|j| lower[j][i]));
        // ln(0) = -inf pins a zero-mean primitive at exactly zero.
        let log_mean = std::array::from_fn(|j| {
            let column_sum_sq: f64 = (0..4).map(|i| root[i][j] * root[i][j]).sum();
            mean[j].ln() - column_sum_sq / 2.0
        });

        Ok(TypeSampler { log_mean, root, numerics: *numerics })
    }

    /// One raw draw of `(A, H, MReal, SReal)`.
    pub fn draw_primitives(&self, rng: &mut impl Rng) -> [f64; 4] {
        let z: [f64; 4] = std::array::from_fn(|_| StandardNormal.sample(&mut *rng));
        std::array::from_fn(|j| {
            let shock: f64 = (0..4).map(|i| z[i] * self.root[i][j]).sum();
            (self.log_mean[j] + shock).exp()
        })
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Result<ConsumerType, ModelError> {
        let [a, h, m_real, s_real] = self.draw_primitives(rng);
        let loss = calibrate_loss(m_real, s_real, &self.numerics)?;
        Ok(ConsumerType { a, h, m: loss.m, s: loss.s, m_real, s_real })
    }
}
