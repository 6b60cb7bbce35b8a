use crate::error::ModelError;
use crate::types::Contract;

/// Check a contract's structural invariants against the public maximum.
///
/// Coinsurance must lie in [0, 1]; the deductible must be non-negative and no
/// larger than the out-of-pocket maximum, which in turn may not exceed the
/// public insurance maximum.
pub fn validate_contract(contract: &Contract, public_maximum: f64) -> Result<(), ModelError> {
    let Contract { deductible, coinsurance, oop_max, .. } = *contract;
    let reason = if !(deductible.is_finite() && coinsurance.is_finite() && oop_max.is_finite()) {
        Some("terms must be finite".to_string())
    } else if !(0.0..=1.0).contains(&coinsurance) {
        Some(format!("coinsurance {coinsurance} outside [0, 1]"))
    } else if deductible < 0.0 {
        Some(format!("deductible {deductible} is negative"))
    } else if deductible > oop_max {
        Some(format!("deductible {deductible} exceeds oop max {oop_max}"))
    } else if oop_max > public_maximum {
        Some(format!("oop max {oop_max} exceeds public maximum {public_maximum}"))
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ModelError::InvalidContract { name: contract.name.clone(), reason }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const PUBLIC_MAX: f64 = 12_000.0;

    fn reason(result: Result<(), ModelError>) -> String {
        match result {
            Err(ModelError::InvalidContract { reason, .. }) => reason,
            other => panic!("expected InvalidContract, got {other:?}"),
        }
    }

    #[test]
    fn accepts_typical_contract() {
        let c = Contract::new("Gold", 500.0, 0.1, 3_500.0);
        assert!(validate_contract(&c, PUBLIC_MAX).is_ok());
    }

    #[test]
    fn accepts_null_contract() {
        assert!(validate_contract(&Contract::null(PUBLIC_MAX), PUBLIC_MAX).is_ok());
    }

    #[test]
    fn accepts_deductible_equal_to_oop_max() {
        let c = Contract::new("Flat", 2_000.0, 0.2, 2_000.0);
        assert!(validate_contract(&c, PUBLIC_MAX).is_ok());
    }

    #[test]
    fn rejects_coinsurance_above_one() {
        let c = Contract::new("Bad", 500.0, 1.5, 3_500.0);
        assert!(reason(validate_contract(&c, PUBLIC_MAX)).contains("coinsurance"));
    }

    #[test]
    fn rejects_negative_coinsurance() {
        let c = Contract::new("Bad", 500.0, -0.1, 3_500.0);
        assert!(reason(validate_contract(&c, PUBLIC_MAX)).contains("coinsurance"));
    }

    #[test]
    fn rejects_negative_deductible() {
        let c = Contract::new("Bad", -1.0, 0.1, 3_500.0);
        assert!(reason(validate_contract(&c, PUBLIC_MAX)).contains("negative"));
    }

    #[test]
    fn rejects_deductible_above_oop_max() {
        let c = Contract::new("Bad", 4_000.0, 0.1, 3_500.0);
        assert!(reason(validate_contract(&c, PUBLIC_MAX)).contains("exceeds oop max"));
    }

    #[test]
    fn rejects_oop_max_above_public_max() {
        let c = Contract::new("Bad", 500.0, 0.1, 20_000.0);
        assert!(reason(validate_contract(&c, PUBLIC_MAX)).contains("public maximum"));
    }

    #[test]
    fn rejects_nan_terms() {
        let c = Contract::new("Bad", f64::NAN, 0.1, 3_500.0);
        assert!(reason(validate_contract(&c, PUBLIC_MAX)).contains("finite"));
    }

    #[test]
    fn error_carries_contract_name() {
        let c = Contract::new("Silver", 500.0, 2.0, 3_500.0);
        match validate_contract(&c, PUBLIC_MAX) {
            Err(ModelError::InvalidContract { name, .. }) => assert_eq!(name, "Silver"),
            other => panic!("expected InvalidContract, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn ordered_terms_within_bounds_always_validate(
            deductible in 0.0f64..PUBLIC_MAX,
            gap in 0.0f64..1.0,
            coinsurance in 0.0f64..=1.0,
        ) {
            let oop_max = deductible + gap * (PUBLIC_MAX - deductible);
            let c = Contract::new("Generated", deductible, coinsurance, oop_max);
            prop_assert!(validate_contract(&c, PUBLIC_MAX).is_ok());
        }
    }
}
