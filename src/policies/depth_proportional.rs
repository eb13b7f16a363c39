use serde::{Deserialize, Serialize};

use super::r#trait::StratumRetentionPolicy;
use crate::bit_floor;
use crate::errors::{HstratError, Result};

/// Retains strata with spacing proportional to depth (total depositions).
///
/// Ranks are kept on a grid whose spacing is the largest power of two not
/// exceeding `n / resolution`, so at most `2 * resolution + 1` strata are
/// held at any time and absolute MRCA uncertainty grows linearly with `n`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepthProportionalPolicy {
    pub resolution: u64,
}

impl DepthProportionalPolicy {
    pub fn new(resolution: u64) -> Self {
        assert!(resolution > 0, "resolution must be positive");
        Self { resolution }
    }

    pub fn try_new(resolution: u64) -> Result<Self> {
        let policy = Self { resolution };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(HstratError::InvalidPolicyParam {
                param: "resolution",
                value: self.resolution.to_string(),
            });
        }
        Ok(())
    }
}

/// Grid spacing after `num_strata_deposited` depositions.
pub(crate) fn calc_provided_uncertainty(resolution: u64, num_strata_deposited: u64) -> u64 {
    bit_floor(num_strata_deposited / resolution).max(1)
}

impl StratumRetentionPolicy for DepthProportionalPolicy {
    fn algo_identifier(&self) -> &'static str {
        "depth_proportional_resolution_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        if num_strata_deposited == 0 {
            return Some(Box::new(core::iter::empty()));
        }
        let newest_rank = num_strata_deposited - 1;
        let spacing = calc_provided_uncertainty(self.resolution, num_strata_deposited);
        let needs_extra = !newest_rank.is_multiple_of(spacing);
        Some(Box::new(
            (0..=newest_rank)
                .step_by(spacing as usize)
                .chain(needs_extra.then_some(newest_rank)),
        ))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        num_strata_deposited.min(2 * self.resolution + 1)
    }

    fn calc_num_strata_retained_exact(&self, num_strata_deposited: u64) -> Option<u64> {
        if num_strata_deposited == 0 {
            return Some(0);
        }
        let newest_rank = num_strata_deposited - 1;
        let spacing = calc_provided_uncertainty(self.resolution, num_strata_deposited);
        let extra = u64::from(!newest_rank.is_multiple_of(spacing));
        Some(num_strata_deposited.div_ceil(spacing) + extra)
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        let index = index as u64;
        let spacing = calc_provided_uncertainty(self.resolution, num_strata_deposited);
        if index < num_strata_deposited.div_ceil(spacing) {
            Some(index * spacing)
        } else if index < self.calc_num_strata_retained_exact(num_strata_deposited)? {
            Some(num_strata_deposited - 1)
        } else {
            None
        }
    }
}
