use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::r#trait::StratumRetentionPolicy;
use crate::bit_floor;
use crate::errors::{HstratError, Result};

/// Retains strata using a geometric sequence based on the nth-root of the
/// number of depositions.
///
/// The `degree` parameter sets how many geometrically spaced recency targets
/// are tracked, and `interspersal` sets how many retained strata cover the
/// span behind each target.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeometricSeqNthRootPolicy {
    pub degree: u64,
    pub interspersal: u64,
}

impl GeometricSeqNthRootPolicy {
    pub fn new(degree: u64, interspersal: u64) -> Self {
        assert!(degree > 0, "degree must be positive");
        assert!(interspersal > 0, "interspersal must be positive");
        Self {
            degree,
            interspersal,
        }
    }

    /// Create with default interspersal of 2.
    pub fn with_degree(degree: u64) -> Self {
        Self::new(degree, 2)
    }

    pub fn try_new(degree: u64, interspersal: u64) -> Result<Self> {
        let policy = Self {
            degree,
            interspersal,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        validate_params(self.degree, self.interspersal)
    }
}

pub(crate) fn validate_params(degree: u64, interspersal: u64) -> Result<()> {
    if degree == 0 {
        return Err(HstratError::InvalidPolicyParam {
            param: "degree",
            value: degree.to_string(),
        });
    }
    if interspersal == 0 {
        return Err(HstratError::InvalidPolicyParam {
            param: "interspersal",
            value: interspersal.to_string(),
        });
    }
    Ok(())
}

/// Calculate the common ratio: `num_strata_deposited^(1/degree)`.
fn calc_common_ratio(degree: u64, num_strata_deposited: u64) -> f64 {
    (num_strata_deposited as f64).powf(1.0 / degree as f64)
}

/// Compute the set of retained ranks for this policy.
///
/// For each power `1..=degree` a target recency `ratio^pow` is derived; the
/// span behind it, widened by `1/interspersal`, is covered by ranks spaced at
/// the power of two nearest below `recency / interspersal`.
pub(crate) fn compute_retained_ranks(
    degree: u64,
    interspersal: u64,
    num_strata_deposited: u64,
) -> Vec<u64> {
    if num_strata_deposited == 0 {
        return Vec::new();
    }

    let last_rank = num_strata_deposited - 1;
    let mut retained = BTreeSet::new();
    retained.insert(0u64);
    retained.insert(last_rank);

    let common_ratio = calc_common_ratio(degree, num_strata_deposited);

    for pow in 1..=degree {
        // repeated multiplication keeps perfect powers exact, e.g.
        // 16^(1/3) cubed is 16.0 here but 15.999... through powf
        let mut target_recency = 1.0f64;
        for _ in 0..pow {
            target_recency *= common_ratio;
        }

        let target_sep = (target_recency / interspersal as f64).max(1.0);
        let retained_ranks_sep = bit_floor(target_sep as u64).max(1);

        let extended_recency = target_recency * (interspersal + 1) as f64 / interspersal as f64;
        let rank_cutoff = num_strata_deposited.saturating_sub(extended_recency.ceil() as u64);

        // round the cutoff up onto the separation grid
        let min_retained_rank = rank_cutoff.next_multiple_of(retained_ranks_sep);

        retained.extend((min_retained_rank..num_strata_deposited).step_by(retained_ranks_sep as usize));
    }

    retained.into_iter().collect()
}

/// Column size ceiling shared by the plain and tapered variants.
pub(crate) fn calc_upper_bound(degree: u64, interspersal: u64, num_strata_deposited: u64) -> u64 {
    let bound = degree
        .saturating_mul(2)
        .saturating_mul(interspersal + 1)
        .saturating_add(2);
    num_strata_deposited.min(bound)
}

impl StratumRetentionPolicy for GeometricSeqNthRootPolicy {
    fn algo_identifier(&self) -> &'static str {
        "geom_seq_nth_root_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        let ranks = compute_retained_ranks(self.degree, self.interspersal, num_strata_deposited);
        Some(Box::new(ranks.into_iter()))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        calc_upper_bound(self.degree, self.interspersal, num_strata_deposited)
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        compute_retained_ranks(self.degree, self.interspersal, num_strata_deposited)
            .get(index)
            .copied()
    }
}
