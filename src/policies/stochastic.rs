use std::hash::{Hash, Hasher};

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::r#trait::StratumRetentionPolicy;
use crate::errors::{HstratError, Result};

/// Stochastic retention policy.
///
/// Retains first (rank 0) and last (newest) strata always. When a stratum
/// becomes second-most-recent it survives with probability
/// `retention_probability`, drawn from the depositing column's RNG; strata
/// that survive that one draw are kept forever.
///
/// The retained set is not a function of the deposit count, so only the
/// upper-bound scryers are available.
///
/// `PartialEq` is implemented via bitwise f64 comparison to avoid
/// floating-point equality pitfalls.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StochasticPolicy {
    pub retention_probability: f64,
}

impl Default for StochasticPolicy {
    fn default() -> Self {
        Self {
            retention_probability: 0.5,
        }
    }
}

impl StochasticPolicy {
    pub fn new(retention_probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&retention_probability),
            "retention_probability must be in [0, 1]"
        );
        Self {
            retention_probability,
        }
    }

    pub fn try_new(retention_probability: f64) -> Result<Self> {
        let policy = Self {
            retention_probability,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.retention_probability) {
            return Err(HstratError::InvalidPolicyParam {
                param: "retention_probability",
                value: self.retention_probability.to_string(),
            });
        }
        Ok(())
    }
}

impl PartialEq for StochasticPolicy {
    fn eq(&self, other: &Self) -> bool {
        self.retention_probability.to_bits() == other.retention_probability.to_bits()
    }
}

impl Eq for StochasticPolicy {}

impl Hash for StochasticPolicy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.retention_probability.to_bits().hash(state);
    }
}

impl StratumRetentionPolicy for StochasticPolicy {
    fn algo_identifier(&self) -> &'static str {
        "stochastic_algo"
    }

    fn iter_retained_ranks(&self, _: u64) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        None
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        num_strata_deposited
    }

    fn gen_drop_ranks(
        &self,
        num_strata_deposited: u64,
        retained_ranks: &[u64],
        rng: &mut dyn RngCore,
    ) -> Vec<u64> {
        // the incoming stratum sits at `num_strata_deposited`
        let Some(second_most_recent) = num_strata_deposited.checked_sub(1) else {
            return Vec::new();
        };
        if second_most_recent == 0 || retained_ranks.binary_search(&second_most_recent).is_err() {
            return Vec::new();
        }
        if rng.gen::<f64>() < self.retention_probability {
            Vec::new()
        } else {
            vec![second_most_recent]
        }
    }
}
