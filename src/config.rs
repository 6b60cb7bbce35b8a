use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::Contract;

/// Lognormal hyperparameters for the primitive type vector
/// `(A, H, MReal, SReal)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDistribution {
    /// Target means of the four primitives (level space, not log space).
    pub mean: [f64; 4],
    /// Covariance of the underlying normal (log space).
    pub log_covariance: [[f64; 4]; 4],
}

/// Tolerances and limits for the numerical routines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericsConfig {
    /// Finest step of the outward walk that locates the loss window.
    pub bound_search_tolerance: f64,
    pub bound_search_initial_step: f64,
    /// Allowed deviation of the windowed density mass from 1.
    pub density_mass_tolerance: f64,
    pub quadrature_abs_tolerance: f64,
    pub quadrature_rel_tolerance: f64,
    pub quadrature_max_subdivisions: usize,
    /// Relative slack before `UtilityOrdering` fires.
    pub utility_ordering_tolerance: f64,
    /// Largest accepted sum of relative moment residuals when solving for (M, S).
    pub calibration_tolerance: f64,
    pub calibration_max_restarts: usize,
    pub calibration_max_iterations: usize,
}

impl Default for NumericsConfig {
    fn default() -> Self {
        NumericsConfig {
            bound_search_tolerance: 1e-2,
            bound_search_initial_step: 1e6,
            density_mass_tolerance: 1e-6,
            quadrature_abs_tolerance: 1e-15,
            quadrature_rel_tolerance: 1e-12,
            quadrature_max_subdivisions: 200,
            utility_ordering_tolerance: 1e-6,
            calibration_tolerance: 1e-4,
            calibration_max_restarts: 10,
            calibration_max_iterations: 2_000,
        }
    }
}

/// Immutable market description shared by every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Out-of-pocket cap guaranteed by public insurance.
    pub public_insurance_maximum: f64,
    pub null_contract: Contract,
    pub contracts: Vec<Contract>,
    pub type_distribution: TypeDistribution,
    #[serde(default)]
    pub numerics: NumericsConfig,
}

impl ModelConfig {
    pub fn canonical() -> Self {
        let public_insurance_maximum = 12_000.0;

        // ── Contracts: four metal tiers ───────────────────────────────────────
        // Actuarial value rises Bronze → Platinum; all caps sit below the public max.
        let contracts = vec![
            Contract::new("Bronze", 3_500.0, 0.40, 7_150.0),
            Contract::new("Silver", 1_750.0, 0.30, 5_700.0),
            Contract::new("Gold", 500.0, 0.10, 3_500.0),
            Contract::new("Platinum", 0.0, 0.05, 1_500.0),
        ];

        // ── Types: (A, H, MReal, SReal) ───────────────────────────────────────
        // MReal and SReal are strongly correlated in logs so SReal/MReal stays
        // well inside the range a clipped normal with M >= 0 can reach (< ~1.46).
        let type_distribution = TypeDistribution {
            mean: [1e-5, 1_330.0, 8_800.0, 9_000.0],
            log_covariance: [
                [0.25, 0.00, 0.00, 0.00],
                [0.00, 0.25, 0.05, 0.05],
                [0.00, 0.05, 0.09, 0.0875],
                [0.00, 0.05, 0.0875, 0.09],
            ],
        };

        ModelConfig {
            public_insurance_maximum,
            null_contract: Contract::null(public_insurance_maximum),
            contracts,
            type_distribution,
            numerics: NumericsConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
