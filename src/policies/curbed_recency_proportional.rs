use serde::{Deserialize, Serialize};

use super::depth_proportional_tapered;
use super::r#trait::StratumRetentionPolicy;
use super::recency_proportional;
use crate::bit_length;
use crate::errors::{HstratError, Result};

/// Smallest recency-proportional resolution the curbed policy will use
/// before handing over to tapered depth-proportional retention.
const MIN_RECENCY_RESOLUTION: u64 = 3;

/// Recency-proportional retention under a hard cap on column size.
///
/// While the cap affords it, the policy behaves like
/// [`RecencyProportionalPolicy`](super::RecencyProportionalPolicy) with a
/// resolution that shrinks as the column ages. Once that resolution would
/// fall below three, it switches to
/// [`DepthProportionalTaperedPolicy`](super::DepthProportionalTaperedPolicy)
/// sized to stay within the cap.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurbedRecencyProportionalPolicy {
    pub size_curb: u64,
}

impl CurbedRecencyProportionalPolicy {
    pub fn new(size_curb: u64) -> Self {
        assert!(size_curb >= 3, "size_curb must be at least 3");
        Self { size_curb }
    }

    pub fn try_new(size_curb: u64) -> Result<Self> {
        let policy = Self { size_curb };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size_curb < 3 {
            return Err(HstratError::InvalidPolicyParam {
                param: "size_curb",
                value: self.size_curb.to_string(),
            });
        }
        Ok(())
    }
}

/// Recency-proportional resolution the curb affords at a given depth.
///
/// `None` once it drops below [`MIN_RECENCY_RESOLUTION`].
fn calc_provided_resolution(size_curb: u64, num_strata_deposited: u64) -> Option<u64> {
    let resolution = (size_curb / (bit_length(num_strata_deposited) + 1)).checked_sub(1)?;
    (resolution >= MIN_RECENCY_RESOLUTION).then_some(resolution)
}

/// Depth-proportional resolution used after the hand-over.
fn calc_tapered_resolution(size_curb: u64) -> u64 {
    // the final recency resolution reached before the hand-over
    let last_resolution = (1..=64u64)
        .filter_map(|bits| (size_curb / (bits + 1)).checked_sub(1))
        .filter(|&resolution| resolution >= MIN_RECENCY_RESOLUTION)
        .last();
    match last_resolution {
        Some(resolution) => (resolution + 1) / 2,
        None => ((size_curb - 1) / 2).max(1),
    }
}

pub(crate) fn compute_retained_ranks(size_curb: u64, num_strata_deposited: u64) -> Vec<u64> {
    if num_strata_deposited == 0 {
        return Vec::new();
    }
    match calc_provided_resolution(size_curb, num_strata_deposited) {
        Some(resolution) => {
            recency_proportional::compute_retained_ranks(resolution, num_strata_deposited)
        }
        None => depth_proportional_tapered::compute_retained_ranks(
            calc_tapered_resolution(size_curb),
            num_strata_deposited,
        ),
    }
}

impl StratumRetentionPolicy for CurbedRecencyProportionalPolicy {
    fn algo_identifier(&self) -> &'static str {
        "recency_proportional_resolution_curbed_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        let ranks = compute_retained_ranks(self.size_curb, num_strata_deposited);
        Some(Box::new(ranks.into_iter()))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        num_strata_deposited.min(self.size_curb)
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        compute_retained_ranks(self.size_curb, num_strata_deposited)
            .get(index)
            .copied()
    }
}
