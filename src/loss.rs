use tracing::debug;

use crate::config::NumericsConfig;
use crate::error::ModelError;
use crate::normal;
use crate::quadrature::Quadrature;
use crate::types::ConsumerType;

/// Normal(M, S) density of the loss for `ty`. Never truncated at zero.
pub fn density(ty: &ConsumerType, loss: f64) -> f64 {
    normal::pdf((loss - ty.m) / ty.s) / ty.s
}

pub fn log_density(ty: &ConsumerType, loss: f64) -> f64 {
    normal::ln_pdf((loss - ty.m) / ty.s) - ty.s.ln()
}

/// Locate the loss window `[lo, hi]` outside which the density is
/// negligible, then check that the density integrates to one over it.
///
/// The walk starts at `M` and moves outward in steps of
/// `numerics.bound_search_initial_step`, dividing the step by ten whenever the
/// next point would fall below `f64::EPSILON` times the peak density. It ends
/// once the step drops below `tolerance` (or `S / 1000`, whichever is finer,
/// so nearly degenerate types still get a non-empty window).
pub fn integration_bounds(
    ty: &ConsumerType,
    tolerance: f64,
    numerics: &NumericsConfig,
) -> Result<(f64, f64), ModelError> {
    ty.validate()?;

    let finest_step = tolerance.min(ty.s * 1e-3);
    let lo = walk_to_edge(ty, -1.0, numerics.bound_search_initial_step, finest_step);
    let hi = walk_to_edge(ty, 1.0, numerics.bound_search_initial_step, finest_step);

    let quadrature = Quadrature::from(numerics);
    let mass = quadrature.integrate(|l| density(ty, l), lo, hi, &[ty.m]).value;
    if (mass - 1.0).abs() > numerics.density_mass_tolerance {
        return Err(ModelError::DistributionIntegration { mass, lo, hi });
    }

    debug!(m = ty.m, s = ty.s, lo, hi, mass, "loss window");
    Ok((lo, hi))
}

fn walk_to_edge(ty: &ConsumerType, direction: f64, initial_step: f64, finest_step: f64) -> f64 {
    let floor = f64::EPSILON * density(ty, ty.m);
    let mut edge = ty.m;
    let mut step = initial_step;
    while step >= finest_step {
        let next = edge + direction * step;
        if next != edge && density(ty, next) >= floor {
            edge = next;
        } else {
            step /= 10.0;
        }
    }
    edge
}
