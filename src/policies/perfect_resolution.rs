use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::r#trait::StratumRetentionPolicy;
use crate::errors::Result;

/// Retains every stratum ever deposited: zero MRCA uncertainty, but O(n)
/// memory usage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerfectResolutionPolicy {}

impl PerfectResolutionPolicy {
    pub fn new() -> Self {
        Self {}
    }

    /// Parameterless, so always valid.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl StratumRetentionPolicy for PerfectResolutionPolicy {
    fn algo_identifier(&self) -> &'static str {
        "perfect_resolution_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        Some(Box::new(0..num_strata_deposited))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        num_strata_deposited
    }

    fn gen_drop_ranks(&self, _: u64, _: &[u64], _: &mut dyn RngCore) -> Vec<u64> {
        Vec::new()
    }

    fn calc_num_strata_retained_exact(&self, num_strata_deposited: u64) -> Option<u64> {
        Some(num_strata_deposited)
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        let rank = index as u64;
        (rank < num_strata_deposited).then_some(rank)
    }

    fn calc_mrca_uncertainty_abs_upper_bound(&self, _: u64, _: u64, _: u64) -> u64 {
        0
    }
}
