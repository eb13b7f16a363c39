use serde::{Deserialize, Serialize};

use super::r#trait::StratumRetentionPolicy;
use crate::errors::Result;

/// Deterministic pseudo-stochastic retention policy.
///
/// Each stratum gets exactly one chance to be dropped: the deposit that makes
/// it second-most-recent. A salted hash of its rank decides the outcome, so
/// roughly half of all strata survive and the retained set is a pure
/// function of `(hash_salt, num_strata_deposited)`. Rank 0 and the newest
/// rank are always retained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PseudostochasticPolicy {
    pub hash_salt: u64,
}

impl PseudostochasticPolicy {
    pub fn new(hash_salt: u64) -> Self {
        Self { hash_salt }
    }

    pub fn try_new(hash_salt: u64) -> Result<Self> {
        Ok(Self::new(hash_salt))
    }

    /// Every salt is valid.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Deterministic hash deciding whether a rank survives.
    #[inline]
    fn should_retain(&self, rank: u64) -> bool {
        let mut z = rank
            .wrapping_add(self.hash_salt.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        z >> 63 == 0
    }
}

impl StratumRetentionPolicy for PseudostochasticPolicy {
    fn algo_identifier(&self) -> &'static str {
        "pseudostochastic_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        if num_strata_deposited == 0 {
            return Some(Box::new(core::iter::empty()));
        }
        let newest_rank = num_strata_deposited - 1;
        let interior = (1..newest_rank).filter(move |&rank| self.should_retain(rank));
        let newest = (newest_rank > 0).then_some(newest_rank);
        Some(Box::new(core::iter::once(0).chain(interior).chain(newest)))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        num_strata_deposited
    }
}
