use thiserror::Error;

/// Everything that can go wrong evaluating contracts or drawing types.
///
/// All variants are fatal to the call that produced them: they are
/// deterministic consistency failures, never transient.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid contract {name:?}: {reason}")]
    InvalidContract { name: String, reason: String },

    #[error("invalid consumer type: {reason}")]
    InvalidType { reason: String },

    #[error("loss density integrates to {mass} over [{lo}, {hi}], expected 1")]
    DistributionIntegration { mass: f64, lo: f64, hi: f64 },

    #[error(
        "utility without insurance ({without_insurance}) exceeds utility with insurance ({with_insurance})"
    )]
    UtilityOrdering { with_insurance: f64, without_insurance: f64 },

    #[error("payoff regions leave a gap: b1={b1}, b2={b2}, b3={b3}")]
    PayoffRegion { b1: f64, b2: f64, b3: f64 },

    #[error(
        "could not calibrate loss to mean {m_real} / std {s_real}: residual {residual} after {iterations} iterations"
    )]
    TypeCalibration { m_real: f64, s_real: f64, residual: f64, iterations: usize },

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
