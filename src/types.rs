use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::sampler;

/// A nonlinear health-insurance contract: deductible, coinsurance rate on
/// spending above the deductible, and an out-of-pocket maximum.
/// All monetary values in dollars per year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub deductible: f64,
    /// Share of spending above the deductible paid by the consumer, in [0, 1].
    pub coinsurance: f64,
    pub oop_max: f64,
}

impl Contract {
    pub fn new(name: impl Into<String>, deductible: f64, coinsurance: f64, oop_max: f64) -> Self {
        Contract { name: name.into(), deductible, coinsurance, oop_max }
    }

    /// The "no private insurance" contract: the public backstop caps
    /// out-of-pocket spending at `public_maximum` and covers nothing below it.
    pub fn null(public_maximum: f64) -> Self {
        Contract::new("Null", public_maximum, 1.0, public_maximum)
    }

    /// True when the contract has the null shape for this public maximum.
    /// The name is ignored.
    pub fn is_null(&self, public_maximum: f64) -> bool {
        self.deductible == public_maximum
            && self.oop_max == public_maximum
            && self.coinsurance == 1.0
    }
}

/// Consumer parameters.
///
/// `m` and `s` are the mean and standard deviation of the normal loss
/// distribution used internally; `m_real` and `s_real` are the moments of the
/// realised (clipped at zero) loss that `m`/`s` were calibrated to reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumerType {
    /// Absolute risk aversion (CARA coefficient).
    pub a: f64,
    /// Moral-hazard spending response.
    pub h: f64,
    pub m: f64,
    pub s: f64,
    pub m_real: f64,
    pub s_real: f64,
}

impl ConsumerType {
    /// Build a type directly from its normal-loss parameters; the realised
    /// moments are derived from the clipped normal.
    pub fn from_loss_params(a: f64, h: f64, m: f64, s: f64) -> Self {
        let (m_real, s_real) = sampler::clipped_normal_moments(m, s);
        ConsumerType { a, h, m, s, m_real, s_real }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let reason = if !(self.a.is_finite() && self.a >= 0.0) {
            Some(format!("risk aversion must be finite and >= 0, got {}", self.a))
        } else if !(self.h.is_finite() && self.h >= 0.0) {
            Some(format!("moral hazard must be finite and >= 0, got {}", self.h))
        } else if !self.m.is_finite() {
            Some(format!("loss mean must be finite, got {}", self.m))
        } else if !(self.s.is_finite() && self.s > 0.0) {
            Some(format!("loss std must be finite and > 0, got {}", self.s))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ModelError::InvalidType { reason }),
            None => Ok(()),
        }
    }
}
