use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};

use medins::config::NumericsConfig;
use medins::loss;
use medins::payoff;
use medins::population;
use medins::quadrature::Quadrature;
use medins::sampler::clipped_normal_moments;
use medins::{ConsumerType, Contract, Model, ModelError};

const PUBLIC_MAX: f64 = 12_000.0;

fn model() -> Model {
    Model::canonical().unwrap()
}

fn gold() -> Contract {
    Contract::new("Gold", 500.0, 0.1, 3_500.0)
}

#[test]
fn null_contract_is_exactly_zero_for_sampled_types() {
    let model = model();
    let null = model.config().null_contract.clone();
    for ty in population::sample_population(&model, 20, 42).unwrap() {
        assert_eq!(model.expected_utility(&null, &ty).unwrap(), 0.0);
        assert_eq!(model.expected_cost(&null, &ty).unwrap(), 0.0);
    }
}

#[test]
fn risk_neutral_types_never_lose_from_insurance() {
    let model = model();
    for mut ty in population::sample_population(&model, 20, 1_000).unwrap() {
        ty.a = 0.0;
        for contract in model.contracts() {
            let wtp = model.expected_utility(contract, &ty).unwrap();
            assert!(wtp >= 0.0, "{}: wtp {wtp} for {ty:?}", contract.name);
        }
    }
}

#[test]
fn expected_cost_matches_monte_carlo() {
    let model = model();
    let ty = ConsumerType::from_loss_params(0.0, 0.0, 4_340.0, 16_000.0);
    let analytic = model.expected_cost(&gold(), &ty).unwrap();

    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let draws = 1_000_000;
    let mut total = 0.0;
    for _ in 0..draws {
        let z: f64 = StandardNormal.sample(&mut rng);
        let loss = ty.m + ty.s * z;
        total += payoff::ex_post_cost(&gold(), &ty, PUBLIC_MAX, loss).unwrap().0;
    }
    let monte_carlo = total / draws as f64;

    assert!(
        (analytic / monte_carlo - 1.0).abs() < 0.01,
        "quadrature {analytic}, Monte Carlo {monte_carlo}"
    );
}

#[test]
fn cara_willingness_to_pay_is_positive_and_bounded() {
    let ty = ConsumerType::from_loss_params(1e-5, 1_330.0, 4_340.0, 16_000.0);
    let wtp = model().expected_utility(&gold(), &ty).unwrap();
    assert!(wtp > 0.0, "wtp {wtp}");
    assert!(wtp < PUBLIC_MAX + ty.h / 2.0, "wtp {wtp}");
}

#[test]
fn deductible_equal_to_oop_max_evaluates() {
    let model = model();
    let flat = Contract::new("Flat", 2_000.0, 0.2, 2_000.0);
    for h in [0.0, 1_330.0] {
        for a in [0.0, 1e-5] {
            let ty = ConsumerType::from_loss_params(a, h, 4_340.0, 16_000.0);
            let wtp = model.expected_utility(&flat, &ty).unwrap();
            let cost = model.expected_cost(&flat, &ty).unwrap();
            assert!(wtp.is_finite() && wtp >= 0.0, "A={a} H={h}: wtp {wtp}");
            assert!(cost.is_finite() && cost > 0.0, "A={a} H={h}: cost {cost}");
        }
    }
}

#[test]
fn vanishing_coinsurance_is_well_defined() {
    let model = model();
    let ty = ConsumerType::from_loss_params(1e-5, 1_330.0, 4_340.0, 16_000.0);
    let zero = model.expected_cost(&Contract::new("Zero", 1_000.0, 0.0, 4_000.0), &ty).unwrap();
    let tiny = model.expected_cost(&Contract::new("Tiny", 1_000.0, 1e-12, 4_000.0), &ty).unwrap();
    assert!(zero.is_finite() && tiny.is_finite());
    assert!((zero - tiny).abs() < 1e-3 * zero, "c=0: {zero}, c=1e-12: {tiny}");
}

#[test]
fn more_generous_contracts_cost_more() {
    let model = model();
    let ty = ConsumerType::from_loss_params(1e-5, 1_330.0, 4_340.0, 16_000.0);
    let costs: Vec<f64> = model
        .contracts()
        .iter()
        .map(|c| model.expected_cost(c, &ty).unwrap())
        .collect();
    // Canonical tiers run Bronze, Silver, Gold, Platinum.
    for pair in costs.windows(2) {
        assert!(pair[0] < pair[1], "costs not increasing: {costs:?}");
    }
}

#[test]
fn integration_window_holds_unit_mass_for_narrow_losses() {
    let numerics = NumericsConfig::default();
    let quadrature = Quadrature::from(&numerics);
    for s in [1e-6, 1e-3, 1.0, 16_000.0] {
        let ty = ConsumerType::from_loss_params(0.0, 0.0, 4_340.0, s);
        let (lo, hi) = loss::integration_bounds(&ty, 1e-2, &numerics).unwrap();
        let mass = quadrature.integrate(|l| loss::density(&ty, l), lo, hi, &[ty.m]).value;
        assert!((mass - 1.0).abs() < 1e-6, "S={s}: mass {mass}");
    }
}

#[test]
fn sampled_types_round_trip_through_clipped_moments() {
    let model = model();
    for ty in population::sample_population(&model, 50, 42).unwrap() {
        let (mean, sd) = clipped_normal_moments(ty.m, ty.s);
        assert!((mean / ty.m_real - 1.0).abs() < 1e-3, "{ty:?}");
        assert!((sd / ty.s_real - 1.0).abs() < 1e-3, "{ty:?}");
        assert!(ty.m >= 0.0 && ty.m <= ty.m_real, "{ty:?}");
        assert!(ty.s >= ty.s_real, "{ty:?}");
    }
}

#[test]
fn invalid_contract_surfaces_immediately() {
    let model = model();
    let ty = ConsumerType::from_loss_params(0.0, 0.0, 4_340.0, 16_000.0);
    let over_cap = Contract::new("OverCap", 1_000.0, 0.2, 15_000.0);
    assert!(matches!(model.validate_contract(&over_cap), Err(ModelError::InvalidContract { .. })));
    assert!(matches!(
        model.expected_utility(&over_cap, &ty),
        Err(ModelError::InvalidContract { .. })
    ));
}
