//! Ex-ante expected utility and expected cost of a contract for one type.
//!
//! Losses below zero are realised as zero, so every expectation is split into
//! a point mass at zero plus a continuous integral over the positive part of
//! the loss window.

use tracing::{debug, warn};

use crate::config::NumericsConfig;
use crate::contract;
use crate::error::ModelError;
use crate::loss;
use crate::minimize;
use crate::payoff::PayoffSchedule;
use crate::quadrature::Quadrature;
use crate::types::{ConsumerType, Contract};

/// Loss window over which a type's density is integrated.
#[derive(Debug, Clone, Copy)]
struct Window {
    lo: f64,
    hi: f64,
    /// Probability that the normal loss is at or below zero.
    zero_mass: f64,
}

impl Window {
    /// Start of the continuous part.
    fn start(&self) -> f64 {
        self.lo.max(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct ExpectedValueEngine {
    public_maximum: f64,
    null_contract: Contract,
    numerics: NumericsConfig,
    quadrature: Quadrature,
}

impl ExpectedValueEngine {
    pub fn new(public_maximum: f64, null_contract: Contract, numerics: &NumericsConfig) -> Self {
        ExpectedValueEngine {
            public_maximum,
            null_contract,
            numerics: *numerics,
            quadrature: Quadrature::from(numerics),
        }
    }

    /// Willingness to pay for `contract` over the null contract.
    ///
    /// Risk-neutral types compare expected utilities; risk-averse types compare
    /// CARA certainty equivalents. Zero for the null contract.
    pub fn expected_utility(
        &self,
        contract: &Contract,
        ty: &ConsumerType,
    ) -> Result<f64, ModelError> {
        contract::validate_contract(contract, self.public_maximum)?;
        if contract.is_null(self.public_maximum) {
            return Ok(0.0);
        }

        let with_insurance = PayoffSchedule::new(contract, ty, self.public_maximum)?;
        let without_insurance = PayoffSchedule::new(&self.null_contract, ty, self.public_maximum)?;
        let window = self.window(ty)?;

        let (u, u0) = if ty.a == 0.0 {
            (
                self.mean_utility(&with_insurance, ty, window),
                self.mean_utility(&without_insurance, ty, window),
            )
        } else {
            (
                self.certainty_equivalent(&with_insurance, ty, window)?,
                self.certainty_equivalent(&without_insurance, ty, window)?,
            )
        };

        check_ordering(u, u0, self.numerics.utility_ordering_tolerance)?;
        Ok(clamp_willingness_to_pay(u - u0, self.public_maximum + ty.h / 2.0, &contract.name))
    }

    /// Insurer's expected net outlay. Zero for the null contract.
    pub fn expected_cost(&self, contract: &Contract, ty: &ConsumerType) -> Result<f64, ModelError> {
        contract::validate_contract(contract, self.public_maximum)?;
        if contract.is_null(self.public_maximum) {
            return Ok(0.0);
        }

        let schedule = PayoffSchedule::new(contract, ty, self.public_maximum)?;
        let window = self.window(ty)?;
        let continuous = self
            .quadrature
            .integrate(
                |l| schedule.cost(l) * loss::density(ty, l),
                window.start(),
                window.hi,
                &waypoints(&schedule, ty),
            )
            .value;
        Ok(window.zero_mass * schedule.cost(0.0) + continuous)
    }

    fn window(&self, ty: &ConsumerType) -> Result<Window, ModelError> {
        let (lo, hi) =
            loss::integration_bounds(ty, self.numerics.bound_search_tolerance, &self.numerics)?;
        let zero_mass = if lo < 0.0 {
            self.quadrature.integrate(|l| loss::density(ty, l), lo, hi.min(0.0), &[ty.m]).value
        } else {
            0.0
        };
        Ok(Window { lo, hi, zero_mass })
    }

    fn mean_utility(&self, schedule: &PayoffSchedule, ty: &ConsumerType, window: Window) -> f64 {
        let continuous = self
            .quadrature
            .integrate(
                |l| schedule.at(l).utility * loss::density(ty, l),
                window.start(),
                window.hi,
                &waypoints(schedule, ty),
            )
            .value;
        window.zero_mass * schedule.at(0.0).utility + continuous
    }

    /// `-ln(E[exp(-A·u)]) / A`, with every exponent shifted by its maximum `K`
    /// so the integrand stays within [0, 1].
    fn certainty_equivalent(
        &self,
        schedule: &PayoffSchedule,
        ty: &ConsumerType,
        window: Window,
    ) -> Result<f64, ModelError> {
        let a = ty.a;
        let exponent = |l: f64| -a * schedule.at(l).utility + loss::log_density(ty, l);
        let point_exponent = window.zero_mass.ln() - a * schedule.at(0.0).utility;

        let start = window.start();
        let mut k = point_exponent;
        if window.hi > start {
            // The exponent is concave in the loss: utility is convex and the
            // log-density is a parabola.
            let peak = minimize::golden_section(
                |l| -exponent(l),
                start,
                (window.hi - 1.0).max(start),
                self.numerics.bound_search_tolerance,
            );
            k = [exponent(peak), exponent(start), exponent(window.hi)]
                .into_iter()
                .fold(k, f64::max);
        }
        if !k.is_finite() {
            return Err(ModelError::DistributionIntegration {
                mass: k.exp(),
                lo: window.lo,
                hi: window.hi,
            });
        }

        let continuous = self
            .quadrature
            .integrate(|l| (exponent(l) - k).exp(), start, window.hi, &waypoints(schedule, ty))
            .value;
        let mass = (point_exponent - k).exp() + continuous;
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(ModelError::DistributionIntegration { mass, lo: window.lo, hi: window.hi });
        }

        let ce = -(mass.ln() + k) / a;
        debug!(a, k, mass, certainty_equivalent = ce, "certainty equivalent");
        Ok(ce)
    }
}

/// Kinks of the payoff plus the density peak.
fn waypoints(schedule: &PayoffSchedule, ty: &ConsumerType) -> Vec<f64> {
    let mut points = schedule.bounds().finite();
    points.push(ty.m);
    points
}

/// Insurance must not leave the consumer worse off than the null contract.
fn check_ordering(
    with_insurance: f64,
    without_insurance: f64,
    tolerance: f64,
) -> Result<(), ModelError> {
    if without_insurance - with_insurance > tolerance * with_insurance.abs() {
        return Err(ModelError::UtilityOrdering { with_insurance, without_insurance });
    }
    Ok(())
}

fn clamp_willingness_to_pay(wtp: f64, cap: f64, contract: &str) -> f64 {
    if wtp > cap {
        warn!(contract, wtp, cap, "willingness to pay above public maximum plus H/2; clamping");
        cap
    } else {
        wtp
    }
}
