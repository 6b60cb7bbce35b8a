use serde::Serialize;

use crate::error::ModelError;
use crate::types::{ConsumerType, Contract};

/// Largest gap between `b1` and `b2`, relative to `b2`, attributed to rounding.
const GAP_TOLERANCE: f64 = 1e-9;

/// Loss thresholds separating the payoff regions, each clipped at zero.
///
/// Below `b1` the consumer pays the whole loss; on `[b2, b3]` they pay
/// coinsurance and spend `(1 - c)·H` more; above the coinsurance region they
/// hit the out-of-pocket maximum and spend `H` more.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breakpoints {
    pub b1: f64,
    pub b2: f64,
    pub b3: f64,
}

impl Breakpoints {
    pub const ZERO: Breakpoints = Breakpoints { b1: 0.0, b2: 0.0, b3: 0.0 };

    pub fn for_contract(contract: &Contract, ty: &ConsumerType) -> Self {
        let Contract { deductible: d, coinsurance: c, oop_max, .. } = *contract;
        let h = ty.h;
        let b2_raw = d - (1.0 - c) * h / 2.0;
        let b1 = b2_raw.min(oop_max - h / 2.0).max(0.0);
        let b3_raw = if c > 0.0 {
            (oop_max - (1.0 - c) * d) / c - (2.0 - c) * h / 2.0
        } else if oop_max > d {
            // Zero coinsurance never reaches the cap.
            f64::INFINITY
        } else {
            b2_raw
        };
        Breakpoints { b1, b2: b2_raw.max(0.0), b3: b3_raw.max(0.0) }
    }

    /// Finite thresholds, for use as quadrature waypoints.
    pub fn finite(&self) -> Vec<f64> {
        [self.b1, self.b2, self.b3].into_iter().filter(|b| b.is_finite()).collect()
    }

    /// Reject thresholds that would leave losses in `[b1, b2)` with no region
    /// while a coinsurance region still exists above them.
    fn check(&self) -> Result<(), ModelError> {
        let gap = self.b2 - self.b1;
        if self.b2 <= self.b3 && gap > GAP_TOLERANCE * self.b2.abs().max(1.0) {
            return Err(ModelError::PayoffRegion { b1: self.b1, b2: self.b2, b3: self.b3 });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Region {
    /// Null contract: public insurance only.
    Public,
    BelowDeductible,
    Coinsurance,
    AboveOopMax,
}

/// Outcome for one realised loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExPostPayoff {
    pub utility: f64,
    /// Total medical spending, including the moral-hazard increment.
    pub expenditure: f64,
    /// Consumer's out-of-pocket payment.
    pub payment: f64,
    pub region: Region,
    pub bounds: Breakpoints,
}

impl ExPostPayoff {
    /// Insurer's net outlay for this outcome.
    pub fn cost(&self) -> f64 {
        match self.region {
            Region::Public => 0.0,
            _ => self.expenditure - self.payment,
        }
    }
}

/// A contract priced for one type: thresholds computed and checked once, then
/// evaluated at any loss without failure.
#[derive(Debug, Clone)]
pub struct PayoffSchedule {
    deductible: f64,
    coinsurance: f64,
    oop_max: f64,
    h: f64,
    /// `Some(public max)` for the null contract.
    public_only: Option<f64>,
    bounds: Breakpoints,
}

impl PayoffSchedule {
    pub fn new(
        contract: &Contract,
        ty: &ConsumerType,
        public_maximum: f64,
    ) -> Result<Self, ModelError> {
        let (public_only, bounds) = if contract.is_null(public_maximum) {
            let b = public_maximum;
            (Some(public_maximum), Breakpoints { b1: b, b2: b, b3: b })
        } else {
            let bounds = Breakpoints::for_contract(contract, ty);
            bounds.check()?;
            (None, bounds)
        };
        Ok(PayoffSchedule {
            deductible: contract.deductible,
            coinsurance: contract.coinsurance,
            oop_max: contract.oop_max,
            h: ty.h,
            public_only,
            bounds,
        })
    }

    pub fn bounds(&self) -> Breakpoints {
        self.bounds
    }

    pub fn is_public_only(&self) -> bool {
        self.public_only.is_some()
    }

    /// Payoff at a realised loss; negative losses count as zero.
    ///
    /// In the coinsurance region the consumer pays `d + c·(expenditure − d)`.
    pub fn at(&self, loss: f64) -> ExPostPayoff {
        let l = loss.max(0.0);
        let bounds = self.bounds;

        if let Some(public_max) = self.public_only {
            return ExPostPayoff {
                utility: (-l).max(-public_max),
                expenditure: l,
                payment: l.min(public_max),
                region: Region::Public,
                bounds,
            };
        }

        let (d, c, h) = (self.deductible, self.coinsurance, self.h);
        // With a coinsurance region present, `check` leaves [b1, b2) no wider
        // than rounding, so it belongs to that region.
        let in_coinsurance = (l >= bounds.b2 && l <= bounds.b3)
            || (l >= bounds.b1 && l < bounds.b2 && bounds.b2 <= bounds.b3);

        if l < bounds.b1 {
            ExPostPayoff {
                utility: -l,
                expenditure: l,
                payment: l,
                region: Region::BelowDeductible,
                bounds,
            }
        } else if in_coinsurance {
            let expenditure = (1.0 - c) * h + l;
            ExPostPayoff {
                utility: (1.0 - c).powi(2) * h / 2.0 - (1.0 - c) * d - c * l,
                expenditure,
                payment: d + c * (expenditure - d),
                region: Region::Coinsurance,
                bounds,
            }
        } else {
            ExPostPayoff {
                utility: h / 2.0 - self.oop_max,
                expenditure: h + l,
                payment: self.oop_max,
                region: Region::AboveOopMax,
                bounds,
            }
        }
    }

    /// Insurer's net outlay at a realised loss.
    pub fn cost(&self, loss: f64) -> f64 {
        self.at(loss).cost()
    }
}

/// Utility, spending and out-of-pocket payment for `contract` held by `ty`
/// when the realised loss is `loss`.
pub fn ex_post_payoff(
    contract: &Contract,
    ty: &ConsumerType,
    public_maximum: f64,
    loss: f64,
) -> Result<ExPostPayoff, ModelError> {
    Ok(PayoffSchedule::new(contract, ty, public_maximum)?.at(loss))
}

/// Insurer's net outlay `expenditure - payment` and the region thresholds.
/// The null contract costs nothing and reports zero thresholds.
pub fn ex_post_cost(
    contract: &Contract,
    ty: &ConsumerType,
    public_maximum: f64,
    loss: f64,
) -> Result<(f64, Breakpoints), ModelError> {
    if contract.is_null(public_maximum) {
        return Ok((0.0, Breakpoints::ZERO));
    }
    let payoff = ex_post_payoff(contract, ty, public_maximum, loss)?;
    Ok((payoff.cost(), payoff.bounds))
}
