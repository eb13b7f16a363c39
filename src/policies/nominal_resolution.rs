use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::r#trait::StratumRetentionPolicy;
use crate::errors::Result;

/// Retains only the first and most recent strata -- minimal memory usage,
/// maximum MRCA uncertainty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NominalResolutionPolicy {}

impl NominalResolutionPolicy {
    pub fn new() -> Self {
        Self {}
    }

    /// Parameterless, so always valid.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl StratumRetentionPolicy for NominalResolutionPolicy {
    fn algo_identifier(&self) -> &'static str {
        "nominal_resolution_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        Some(match num_strata_deposited {
            0 => Box::new(core::iter::empty()),
            1 => Box::new(core::iter::once(0u64)),
            n => Box::new([0u64, n - 1].into_iter()),
        })
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        num_strata_deposited.min(2)
    }

    fn gen_drop_ranks(
        &self,
        num_strata_deposited: u64,
        retained_ranks: &[u64],
        _: &mut dyn RngCore,
    ) -> Vec<u64> {
        // the incoming stratum sits at rank `num_strata_deposited`
        retained_ranks
            .iter()
            .copied()
            .filter(|&rank| rank != 0 && rank != num_strata_deposited)
            .collect()
    }

    fn calc_num_strata_retained_exact(&self, num_strata_deposited: u64) -> Option<u64> {
        Some(num_strata_deposited.min(2))
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        match (index, num_strata_deposited) {
            (_, 0) => None,
            (0, _) => Some(0),
            (1, n) if n >= 2 => Some(n - 1),
            _ => None,
        }
    }
}
