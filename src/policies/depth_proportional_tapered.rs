use serde::{Deserialize, Serialize};

use super::depth_proportional::calc_provided_uncertainty;
use super::r#trait::StratumRetentionPolicy;
use crate::errors::{HstratError, Result};

/// Depth-proportional retention that thins the previous grid one stratum at
/// a time instead of halving it in a single deposit.
///
/// Column size therefore grows and shrinks smoothly, staying within
/// `2 * resolution + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepthProportionalTaperedPolicy {
    pub resolution: u64,
}

impl DepthProportionalTaperedPolicy {
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

/// Compute the retained ranks: the current grid plus the tail of the previous
/// (twice as fine) grid that has not yet been tapered away.
pub(crate) fn compute_retained_ranks(resolution: u64, num_strata_deposited: u64) -> Vec<u64> {
    if num_strata_deposited == 0 {
        return Vec::new();
    }
    let spacing = calc_provided_uncertainty(resolution, num_strata_deposited);
    if spacing == 1 {
        return (0..num_strata_deposited).collect();
    }

    let newest_rank = num_strata_deposited - 1;
    let half = spacing / 2;
    let grid_start = spacing * resolution;
    let num_tapered = (num_strata_deposited - grid_start + 1).min(resolution);

    // odd multiples of `half` below `grid_start` are the previous grid's
    // leftovers; the oldest `num_tapered` of them are already gone
    let leftovers = (half..grid_start)
        .step_by(spacing as usize)
        .skip(num_tapered as usize);

    let mut retained: Vec<u64> = (0..num_strata_deposited)
        .step_by(spacing as usize)
        .chain(leftovers)
        .collect();
    retained.sort_unstable();
    if retained.last() != Some(&newest_rank) {
        retained.push(newest_rank);
    }
    retained
}

impl StratumRetentionPolicy for DepthProportionalTaperedPolicy {
    fn algo_identifier(&self) -> &'static str {
        "depth_proportional_resolution_tapered_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        let ranks = compute_retained_ranks(self.resolution, num_strata_deposited);
        Some(Box::new(ranks.into_iter()))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        num_strata_deposited.min(2 * self.resolution + 1)
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        compute_retained_ranks(self.resolution, num_strata_deposited)
            .get(index)
            .copied()
    }
}
