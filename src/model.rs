use rand::Rng;

use crate::config::ModelConfig;
use crate::contract;
use crate::error::ModelError;
use crate::expected::ExpectedValueEngine;
use crate::sampler::TypeSampler;
use crate::types::{ConsumerType, Contract};

/// Entry point for callers: a validated configuration with its expected-value
/// engine and type sampler. Immutable once built, so one `Model` can be shared
/// across threads.
#[derive(Debug, Clone)]
pub struct Model {
    config: ModelConfig,
    engine: ExpectedValueEngine,
    sampler: TypeSampler,
}

impl Model {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let pm = config.public_insurance_maximum;
        if !(pm.is_finite() && pm > 0.0) {
            return Err(ModelError::InvalidConfig(format!(
                "public insurance maximum must be finite and positive, got {pm}"
            )));
        }
        if !config.null_contract.is_null(pm) {
            return Err(ModelError::InvalidConfig(format!(
                "null contract {:?} must have deductible = oop max = {pm} and coinsurance 1",
                config.null_contract.name
            )));
        }
        contract::validate_contract(&config.null_contract, pm)?;
        for c in &config.contracts {
            contract::validate_contract(c, pm)?;
        }

        let sampler = TypeSampler::new(&config.type_distribution, &config.numerics)?;
        let engine = ExpectedValueEngine::new(pm, config.null_contract.clone(), &config.numerics);
        Ok(Model { config, engine, sampler })
    }

    pub fn canonical() -> Result<Self, ModelError> {
        Model::new(ModelConfig::canonical())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.config.contracts
    }

    pub fn validate_contract(&self, contract: &Contract) -> Result<(), ModelError> {
        contract::validate_contract(contract, self.config.public_insurance_maximum)
    }

    /// Willingness to pay for `contract` relative to the null contract.
    pub fn expected_utility(
        &self,
        contract: &Contract,
        ty: &ConsumerType,
    ) -> Result<f64, ModelError> {
        self.engine.expected_utility(contract, ty)
    }

    pub fn expected_cost(&self, contract: &Contract, ty: &ConsumerType) -> Result<f64, ModelError> {
        self.engine.expected_cost(contract, ty)
    }

    pub fn sample_type(&self, rng: &mut impl Rng) -> Result<ConsumerType, ModelError> {
        self.sampler.sample(rng)
    }
}
