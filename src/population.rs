//! Parallel maps over a population of consumer types.
//!
//! Every type draw owns its RNG, seeded from `seed + index`, so a population
//! is identical regardless of how rayon schedules the work.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::ModelError;
use crate::model::Model;
use crate::types::{ConsumerType, Contract};

/// One (type, contract) evaluation, flattened for NDJSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub type_index: usize,
    pub contract: String,
    pub a: f64,
    pub h: f64,
    pub m: f64,
    pub s: f64,
    pub m_real: f64,
    pub s_real: f64,
    /// Willingness to pay over the null contract.
    pub utility: f64,
    pub cost: f64,
}

pub fn sample_population(
    model: &Model,
    n: usize,
    seed: u64,
) -> Result<Vec<ConsumerType>, ModelError> {
    (0..n)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed.wrapping_add(i as u64));
            model.sample_type(&mut rng)
        })
        .collect()
}

/// Evaluate every contract for every type. Records are ordered by type, then
/// by contract in the order given.
pub fn evaluate_population(
    model: &Model,
    contracts: &[Contract],
    types: &[ConsumerType],
) -> Result<Vec<Evaluation>, ModelError> {
    let per_type: Vec<Vec<Evaluation>> = types
        .par_iter()
        .enumerate()
        .map(|(type_index, ty)| {
            contracts
                .iter()
                .map(|contract| -> Result<Evaluation, ModelError> {
                    Ok(Evaluation {
                        type_index,
                        contract: contract.name.clone(),
                        a: ty.a,
                        h: ty.h,
                        m: ty.m,
                        s: ty.s,
                        m_real: ty.m_real,
                        s_real: ty.s_real,
                        utility: model.expected_utility(contract, ty)?,
                        cost: model.expected_cost(contract, ty)?,
                    })
                })
                .collect::<Result<Vec<_>, ModelError>>()
        })
        .collect::<Result<_, ModelError>>()?;
    Ok(per_type.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_is_reproducible() {
        let model = Model::canonical().unwrap();
        let a = sample_population(&model, 16, 42).unwrap();
        let b = sample_population(&model, 16, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn population_matches_sequential_draws() {
        let model = Model::canonical().unwrap();
        let population = sample_population(&model, 4, 7).unwrap();
        for (i, ty) in population.iter().enumerate() {
            let mut rng = ChaCha20Rng::seed_from_u64(7 + i as u64);
            assert_eq!(*ty, model.sample_type(&mut rng).unwrap());
        }
    }

    #[test]
    fn evaluations_are_ordered_by_type_then_contract() {
        let model = Model::canonical().unwrap();
        let types = sample_population(&model, 3, 42).unwrap();
        let evals = evaluate_population(&model, model.contracts(), &types).unwrap();
        assert_eq!(evals.len(), 3 * model.contracts().len());
        for (k, e) in evals.iter().enumerate() {
            let contracts = model.contracts();
            assert_eq!(e.type_index, k / contracts.len());
            assert_eq!(e.contract, contracts[k % contracts.len()].name);
            assert_eq!(e.m_real, types[e.type_index].m_real);
        }
    }

    #[test]
    fn invalid_contract_fails_the_batch() {
        let model = Model::canonical().unwrap();
        let types = sample_population(&model, 2, 42).unwrap();
        let bad = [Contract::new("Bad", -1.0, 0.1, 1_000.0)];
        assert!(matches!(
            evaluate_population(&model, &bad, &types),
            Err(ModelError::InvalidContract { .. })
        ));
    }

    #[test]
    fn evaluation_json_shape() {
        let e = Evaluation {
            type_index: 3,
            contract: "Gold".into(),
            a: 1e-5,
            h: 1_330.0,
            m: 4_340.0,
            s: 16_000.0,
            m_real: 8_788.0,
            s_real: 11_000.0,
            utility: 2_500.0,
            cost: 4_000.0,
        };
        let value = serde_json::to_value(&e).unwrap();
        assert_eq!(value["type_index"], 3);
        assert_eq!(value["contract"], "Gold");
        assert_eq!(value.as_object().unwrap().len(), 10);
    }
}
